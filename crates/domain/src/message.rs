//! Device message: a `{thing, property, value}` triple.
//!
//! Produced by the controller adapter's inbound parser and sent back out
//! through its serializer. All three parts are kept verbatim as strings.

use serde::{Deserialize, Serialize};

/// A parsed controller message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub thing: String,
    pub property: String,
    pub value: String,
}

impl DeviceMessage {
    #[must_use]
    pub fn new(
        thing: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            thing: thing.into(),
            property: property.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_parts_verbatim() {
        let msg = DeviceMessage::new("living room", "temp", " 21.5 ");
        assert_eq!(msg.thing, "living room");
        assert_eq!(msg.property, "temp");
        assert_eq!(msg.value, " 21.5 ");
    }

    #[test]
    fn should_serialize_as_flat_object() {
        let msg = DeviceMessage::new("kitchen", "light", "on");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"thing": "kitchen", "property": "light", "value": "on"})
        );
    }
}
