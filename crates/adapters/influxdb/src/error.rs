//! InfluxDB adapter error types.

use influxdb2::RequestError;
use influxdb2::models::data_point::DataPointError;

use smarthub_domain::error::{DeviceError, ValidationError};

/// Errors specific to the InfluxDB adapter.
#[derive(Debug, thiserror::Error)]
pub enum InfluxError {
    /// The configuration cannot describe a server.
    #[error("invalid InfluxDB configuration")]
    Config(#[from] ValidationError),

    /// `initialize` was called outside a tokio runtime.
    #[error("no tokio runtime available to run InfluxDB requests")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),

    /// An HTTP request to the server failed.
    #[error("InfluxDB request failed")]
    Request(#[source] RequestError),

    /// A point could not be encoded as line protocol.
    #[error("invalid InfluxDB data point")]
    Point(#[source] DataPointError),
}

impl InfluxError {
    /// Convert into the [`DeviceError`] carried by error events.
    #[must_use]
    pub fn into_device_error(self) -> DeviceError {
        match self {
            Self::Config(_) | Self::NoRuntime(_) => DeviceError::setup(self),
            other => DeviceError::transport(other),
        }
    }
}

impl From<InfluxError> for DeviceError {
    fn from(err: InfluxError) -> Self {
        err.into_device_error()
    }
}
