//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `smarthub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Adapters are only built for the
//! sections that are present. Environment variables take precedence over
//! file values; setting an adapter's host variable also enables that adapter.

use serde::Deserialize;

use smarthub_adapter_influxdb::InfluxConfig;
use smarthub_adapter_loxone::LoxoneConfig;
use smarthub_adapter_mqtt::MqttConfig;
use smarthub_domain::error::ValidationError;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Event bus settings.
    pub events: EventsConfig,
    /// Forwarding of controller readings to the other adapters.
    pub bridge: BridgeConfig,
    /// Loxone Miniserver adapter, if enabled.
    pub loxone: Option<LoxoneConfig>,
    /// MQTT broker adapter, if enabled.
    pub mqtt: Option<MqttConfig>,
    /// InfluxDB adapter, if enabled.
    pub influxdb: Option<InfluxConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// In-process event bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered per subscriber before the slowest one lags.
    pub capacity: usize,
}

/// Controller-to-sink forwarding configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Forward readings received from the Miniserver.
    pub enabled: bool,
    /// Retain flag for forwarded MQTT publications.
    pub retain: bool,
    /// Measurement forwarded readings are written to.
    pub measurement: String,
}

impl Config {
    /// Load configuration from `smarthub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration does not validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("smarthub.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("SMARTHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("SMARTHUB_LOXONE_HOST") {
            self.loxone.get_or_insert_with(LoxoneConfig::default).host = val;
        }
        if let Some(val) = var("SMARTHUB_MQTT_HOST") {
            self.mqtt.get_or_insert_with(MqttConfig::default).host = val;
        }
        if let Some(val) = var("SMARTHUB_INFLUXDB_HOST") {
            self.influxdb.get_or_insert_with(InfluxConfig::default).host = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.events.capacity == 0 {
            return Err(ConfigError::Validation(
                "events.capacity must be non-zero".to_string(),
            ));
        }
        if self.bridge.measurement.is_empty() {
            return Err(ConfigError::Validation(
                "bridge.measurement must not be empty".to_string(),
            ));
        }
        if let Some(loxone) = &self.loxone {
            loxone.validate().map_err(section("loxone"))?;
        }
        if let Some(mqtt) = &self.mqtt {
            mqtt.validate().map_err(section("mqtt"))?;
        }
        if let Some(influxdb) = &self.influxdb {
            influxdb.validate().map_err(section("influxdb"))?;
        }
        Ok(())
    }
}

fn section(section: &'static str) -> impl FnOnce(ValidationError) -> ConfigError {
    move |source| ConfigError::Section { section, source }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "smarthubd=info,smarthub=info".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retain: false,
            measurement: "loxone".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// An adapter section failed its own validation.
    #[error("invalid [{section}] configuration")]
    Section {
        section: &'static str,
        #[source]
        source: ValidationError,
    },
}
