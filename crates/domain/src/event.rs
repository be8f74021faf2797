//! Event: an immutable record of something a device did or observed.
//!
//! Adapters report every state change and every piece of data through
//! [`DeviceEvent`]; there is no query interface.

use std::fmt;
use std::sync::Arc;

use crate::device::DeviceSource;
use crate::error::DeviceError;
use crate::payload::Payload;

/// Everything an adapter can report.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The transport connected or bound.
    Connect { source: Arc<DeviceSource> },
    /// The transport disconnected, unbound, or reported itself unhealthy.
    Disconnect { source: Arc<DeviceSource> },
    /// Informational notice.
    Info {
        source: Arc<DeviceSource>,
        message: String,
    },
    /// Non-fatal problem, e.g. a send before initialization.
    Warning {
        source: Arc<DeviceSource>,
        message: String,
    },
    /// Setup or transport failure.
    Error {
        source: Arc<DeviceSource>,
        message: String,
        error: Arc<DeviceError>,
    },
    /// Data was handed to the transport.
    Send {
        source: Arc<DeviceSource>,
        send_to: String,
        message: Payload,
    },
    /// Data arrived from the transport.
    Receive {
        source: Arc<DeviceSource>,
        receive_from: String,
        message: Payload,
    },
}

/// Discriminant of a [`DeviceEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Info,
    Warning,
    Error,
    Send,
    Receive,
}

impl EventKind {
    /// Wire name of the event, e.g. `"connect"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeviceEvent {
    /// The device that emitted this event.
    #[must_use]
    pub fn source(&self) -> &DeviceSource {
        match self {
            Self::Connect { source }
            | Self::Disconnect { source }
            | Self::Info { source, .. }
            | Self::Warning { source, .. }
            | Self::Error { source, .. }
            | Self::Send { source, .. }
            | Self::Receive { source, .. } => source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect { .. } => EventKind::Connect,
            Self::Disconnect { .. } => EventKind::Disconnect,
            Self::Info { .. } => EventKind::Info,
            Self::Warning { .. } => EventKind::Warning,
            Self::Error { .. } => EventKind::Error,
            Self::Send { .. } => EventKind::Send,
            Self::Receive { .. } => EventKind::Receive,
        }
    }

    /// Payload of a `Send` or `Receive` event.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Send { message, .. } | Self::Receive { message, .. } => Some(message),
            _ => None,
        }
    }
}
