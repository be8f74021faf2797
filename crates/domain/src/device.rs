//! Device: identity of anything that emits events.
//!
//! Every adapter and every [`Thing`](crate::thing::Thing) carries a
//! [`DeviceSource`]: the address it talks to and a type tag used to label
//! log lines and events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The originating device of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSource {
    device_type: String,
    address: String,
}

impl DeviceSource {
    /// Create a source from a type tag and a hostname or IP address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyAddress`] when `address` is empty and
    /// [`ValidationError::Empty`] when `device_type` is empty.
    pub fn new(
        device_type: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let device_type = device_type.into();
        let address = address.into();
        if device_type.is_empty() {
            return Err(ValidationError::Empty("device type"));
        }
        if address.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        Ok(Self {
            device_type,
            address,
        })
    }

    /// Type tag, e.g. `"LoxoneMiniserver"`.
    #[must_use]
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// Hostname or IP address of the device.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for DeviceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.device_type, self.address)
    }
}
