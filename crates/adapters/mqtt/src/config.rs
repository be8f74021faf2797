//! MQTT broker connection configuration.

use serde::Deserialize;

use smarthub_domain::error::ValidationError;

/// Configuration for the MQTT broker adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub host: String,
    /// MQTT broker port.
    pub port: u16,
    /// Topic prefix for every smarthub publication.
    pub topic: String,
    /// MQTT client identifier; a random `smarthub-xxxxxxxx` id when unset.
    pub client_id: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Pause between event-loop polls after a connection error, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Capacity of the client's outgoing request queue.
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "smarthub".to_string(),
            client_id: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 1000,
            request_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Check that the configuration can be used to build an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty host or topic, a zero port or
    /// request capacity, a keep-alive below 5 seconds, or a client id that
    /// is empty or starts with a space.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort("port"));
        }
        if self.topic.is_empty() {
            return Err(ValidationError::Empty("topic"));
        }
        if self.keep_alive_secs < 5 {
            return Err(ValidationError::Invalid(
                "keep_alive_secs must be at least 5".to_string(),
            ));
        }
        if self.request_capacity == 0 {
            return Err(ValidationError::Invalid(
                "request_capacity must be non-zero".to_string(),
            ));
        }
        if let Some(client_id) = &self.client_id {
            validate_client_id(client_id)?;
        }
        Ok(())
    }
}

/// Client ids must be non-empty and must not start with a space.
fn validate_client_id(client_id: &str) -> Result<(), ValidationError> {
    if client_id.is_empty() {
        return Err(ValidationError::Empty("client_id"));
    }
    if client_id.starts_with(' ') {
        return Err(ValidationError::Invalid(
            "client_id must not start with a space".to_string(),
        ));
    }
    Ok(())
}
