//! Payloads carried by `Send` and `Receive` events.
//!
//! Each adapter speaks one payload shape; [`Payload`] closes over all of
//! them so observers can match exhaustively.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::DeviceMessage;
use crate::thing::Thing;

/// Data moved by a send or receive operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// A controller line-protocol message.
    Message(DeviceMessage),
    /// A pub/sub publication.
    Publication(Publication),
    /// A time-series point.
    Point(Point),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = match self {
            Self::Message(inner) => serde_json::to_string(inner),
            Self::Publication(inner) => serde_json::to_string(inner),
            Self::Point(inner) => serde_json::to_string(inner),
        }
        .map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl From<DeviceMessage> for Payload {
    fn from(value: DeviceMessage) -> Self {
        Self::Message(value)
    }
}

impl From<Publication> for Payload {
    fn from(value: Publication) -> Self {
        Self::Publication(value)
    }
}

impl From<Point> for Payload {
    fn from(value: Point) -> Self {
        Self::Point(value)
    }
}

/// JSON body published for a thing's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Epoch milliseconds at the time of the send call.
    pub ts: i64,
    pub val: String,
    pub loc: String,
    pub desc: String,
}

impl Envelope {
    /// Wrap `value` with the thing's location and description.
    #[must_use]
    pub fn new(thing: &Thing, value: impl Into<String>, ts: i64) -> Self {
        Self {
            ts,
            val: value.into(),
            loc: thing.location.clone(),
            desc: thing.description.clone(),
        }
    }
}

/// A publish request as handed to the broker client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub topic: String,
    /// Serialized [`Envelope`].
    pub message: String,
    /// Delivery guarantee, 0..=2.
    pub qos: u8,
    pub retain: bool,
}

/// A single time-series point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub fields: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

impl Point {
    /// Build a one-field point tagged with the thing's identity.
    #[must_use]
    pub fn for_thing(
        thing: &Thing,
        measurement: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let fields = BTreeMap::from([(field.into(), value.into())]);
        let tags = BTreeMap::from([
            ("name".to_string(), thing.name.clone()),
            ("location".to_string(), thing.location.clone()),
            ("description".to_string(), thing.description.clone()),
        ]);
        Self {
            measurement: measurement.into(),
            fields,
            tags,
        }
    }
}
