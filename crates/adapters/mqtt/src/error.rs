//! MQTT adapter error types.

use smarthub_domain::error::{DeviceError, ValidationError};

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The configuration cannot describe a broker connection.
    #[error("invalid MQTT configuration")]
    Config(#[from] ValidationError),

    /// `initialize` was called outside a tokio runtime.
    #[error("no tokio runtime available to drive the MQTT event loop")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),

    /// The rumqttc client rejected a request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The connection to the broker failed or dropped.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::ConnectionError),

    /// Failed to serialize an outgoing envelope as JSON.
    #[error("failed to serialize MQTT envelope")]
    Serialize(#[source] serde_json::Error),
}

impl MqttError {
    /// Convert into the [`DeviceError`] carried by error events.
    #[must_use]
    pub fn into_device_error(self) -> DeviceError {
        match self {
            Self::Config(_) | Self::NoRuntime(_) => DeviceError::setup(self),
            other => DeviceError::transport(other),
        }
    }
}

impl From<MqttError> for DeviceError {
    fn from(err: MqttError) -> Self {
        err.into_device_error()
    }
}
