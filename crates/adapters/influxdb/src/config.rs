//! InfluxDB connection configuration.

use serde::Deserialize;

use smarthub_domain::error::ValidationError;

/// Configuration for the InfluxDB adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// InfluxDB hostname or IP address.
    pub host: String,
    /// InfluxDB HTTP port.
    pub port: u16,
    /// Database points are written to; used as the bucket name.
    pub database: String,
    /// Organization for authenticated servers; empty when unused.
    pub org: String,
    /// API token for authenticated servers; empty when unused.
    pub token: String,
    /// Upper bound for the health probe run by `initialize`, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8086,
            database: "smarthub".to_string(),
            org: String::new(),
            token: String::new(),
            probe_timeout_ms: 5000,
        }
    }
}

impl InfluxConfig {
    /// Check that the configuration can be used to build an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty host or database, a zero port,
    /// or a zero probe timeout.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort("port"));
        }
        if self.database.is_empty() {
            return Err(ValidationError::Empty("database"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ValidationError::Invalid(
                "probe_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
