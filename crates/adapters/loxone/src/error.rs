//! Loxone adapter error types.

use std::io;
use std::str::Utf8Error;

use smarthub_domain::error::{DeviceError, ValidationError};

/// Errors specific to the Loxone adapter.
#[derive(Debug, thiserror::Error)]
pub enum LoxoneError {
    /// The configuration cannot describe a device.
    #[error("invalid Loxone configuration")]
    Config(#[from] ValidationError),

    /// `initialize` was called outside a tokio runtime.
    #[error("no tokio runtime available to drive the UDP socket")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),

    /// The virtual output port could not be bound.
    #[error("failed to bind UDP socket on port {port}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The Miniserver host has no usable IPv4 address.
    #[error("failed to resolve {target} to an IPv4 address")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    /// A datagram could not be sent to the virtual input.
    #[error("failed to send datagram to {target}")]
    Send {
        target: String,
        #[source]
        source: io::Error,
    },

    /// The bound socket failed while waiting for datagrams.
    #[error("failed to receive datagram")]
    Receive(#[source] io::Error),
}

/// Why an inbound datagram was not accepted as a device message.
#[derive(Debug, thiserror::Error)]
pub enum MalformedDatagram {
    #[error("datagram is not valid UTF-8")]
    NotUtf8(#[source] Utf8Error),

    #[error("datagram does not match `thing=<id> property=<name> value=<value>`")]
    NoMatch,
}

impl LoxoneError {
    /// Convert into the [`DeviceError`] carried by error events.
    #[must_use]
    pub fn into_device_error(self) -> DeviceError {
        match self {
            Self::Config(_) | Self::NoRuntime(_) | Self::Bind { .. } => DeviceError::setup(self),
            Self::Resolve { .. } | Self::Send { .. } | Self::Receive(_) => {
                DeviceError::transport(self)
            }
        }
    }
}

impl From<LoxoneError> for DeviceError {
    fn from(err: LoxoneError) -> Self {
        err.into_device_error()
    }
}
