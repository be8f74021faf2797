//! Loxone Miniserver connection configuration.

use serde::Deserialize;

use smarthub_domain::error::ValidationError;

/// What to do with an inbound datagram that does not match the line grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Discard silently (trace log only). Unrelated broadcast traffic is common.
    #[default]
    Drop,
    /// Discard and emit a warning event.
    Warn,
}

/// Configuration for a Loxone Miniserver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoxoneConfig {
    /// Miniserver hostname or IP address.
    pub host: String,
    /// Port of the Miniserver's virtual UDP input; the adapter sends here.
    pub virtual_input_port: u16,
    /// Port the Miniserver's virtual UDP output targets; the adapter binds here.
    /// `0` lets the OS pick a port, see `LoxoneMiniserver::local_addr`.
    pub virtual_output_port: u16,
    /// Handling of datagrams that fail to parse.
    pub on_malformed: MalformedPolicy,
}

impl Default for LoxoneConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            virtual_input_port: 7000,
            virtual_output_port: 7001,
            on_malformed: MalformedPolicy::Drop,
        }
    }
}

impl LoxoneConfig {
    /// Check that the configuration can be used to build an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the host is empty or the virtual input
    /// port is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if self.virtual_input_port == 0 {
            return Err(ValidationError::InvalidPort("virtual_input_port"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = LoxoneConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.virtual_input_port, 7000);
        assert_eq!(config.virtual_output_port, 7001);
        assert_eq!(config.on_malformed, MalformedPolicy::Drop);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            host = "10.0.0.5"
            virtual_input_port = 4000
            virtual_output_port = 4001
            on_malformed = "warn"
        "#;
        let config: LoxoneConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.virtual_input_port, 4000);
        assert_eq!(config.virtual_output_port, 4001);
        assert_eq!(config.on_malformed, MalformedPolicy::Warn);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: LoxoneConfig = toml::from_str(r#"host = "miniserver.local""#).unwrap();
        assert_eq!(config.host, "miniserver.local");
        assert_eq!(config.virtual_input_port, 7000);
        assert_eq!(config.on_malformed, MalformedPolicy::Drop);
    }

    #[test]
    fn should_reject_unknown_malformed_policy() {
        let result: Result<LoxoneConfig, _> = toml::from_str(r#"on_malformed = "panic""#);
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_zero_input_port() {
        let config = LoxoneConfig {
            virtual_input_port: 0,
            ..LoxoneConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidPort("virtual_input_port"))
        );
    }

    #[test]
    fn should_accept_os_picked_output_port() {
        let config = LoxoneConfig {
            virtual_output_port: 0,
            ..LoxoneConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_empty_host() {
        let config = LoxoneConfig {
            host: String::new(),
            ..LoxoneConfig::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::EmptyAddress));
    }
}
