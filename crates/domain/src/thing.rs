//! Thing: an addressable physical entity (sensor or actuator).
//!
//! Things carry the identity used to tag outbound data: a unique name, a
//! free-text location and a free-text description. The caller passes a
//! `&Thing` on every adapter `send`; adapters never own things.

use serde::{Deserialize, Serialize};

use crate::device::DeviceSource;
use crate::error::ValidationError;

/// Type tag used when a thing is built without an explicit one.
pub const DEFAULT_THING_TYPE: &str = "Thing";

/// A named smart home thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub source: DeviceSource,
    /// Unique identifier; defaults to the address.
    pub name: String,
    /// Location or room; may be empty.
    pub location: String,
    /// Free-text description; may be empty.
    pub description: String,
}

impl Thing {
    /// Create a builder for a thing reachable at `address`.
    #[must_use]
    pub fn builder(address: impl Into<String>) -> ThingBuilder {
        ThingBuilder {
            address: address.into(),
            device_type: None,
            name: None,
            location: None,
            description: None,
        }
    }

    /// Hostname or IP address of the thing.
    #[must_use]
    pub fn address(&self) -> &str {
        self.source.address()
    }
}

/// Step-by-step builder for [`Thing`].
#[derive(Debug)]
pub struct ThingBuilder {
    address: String,
    device_type: Option<String>,
    name: Option<String>,
    location: Option<String>,
    description: Option<String>,
}

impl ThingBuilder {
    #[must_use]
    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Consume the builder, validate, and return a [`Thing`].
    ///
    /// An unset or empty name falls back to the address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyAddress`] if the address is empty.
    pub fn build(self) -> Result<Thing, ValidationError> {
        let source = DeviceSource::new(
            self.device_type
                .unwrap_or_else(|| DEFAULT_THING_TYPE.to_string()),
            self.address,
        )?;
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| source.address().to_string());

        Ok(Thing {
            source,
            name,
            location: self.location.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        })
    }
}
