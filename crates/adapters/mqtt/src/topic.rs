//! Topic layout and publication building.
//!
//! ```text
//! <prefix>/connected               retained liveness marker, "2" or "0"
//! <prefix>/<topic>/<thing name>    JSON envelope {ts, val, loc, desc}
//! ```

use rumqttc::QoS;

use smarthub_domain::payload::{Envelope, Publication};
use smarthub_domain::thing::Thing;

/// Liveness marker while the adapter is connected.
pub const ONLINE: &str = "2";
/// Liveness marker once the adapter is gone; also the last-will payload.
pub const OFFLINE: &str = "0";

/// Quality of service used for every publication.
pub const PUBLISH_QOS: QoS = QoS::ExactlyOnce;

#[must_use]
pub fn liveness_topic(prefix: &str) -> String {
    format!("{prefix}/connected")
}

#[must_use]
pub fn thing_topic(prefix: &str, topic: &str, thing_name: &str) -> String {
    format!("{prefix}/{topic}/{thing_name}")
}

/// Build the publication for `value` of `thing` under `topic`.
///
/// # Errors
///
/// Returns the serializer error if the envelope cannot be rendered as JSON.
pub fn build_publication(
    prefix: &str,
    thing: &Thing,
    topic: &str,
    value: &str,
    retain: bool,
    ts: i64,
) -> Result<Publication, serde_json::Error> {
    let envelope = Envelope::new(thing, value, ts);
    Ok(Publication {
        topic: thing_topic(prefix, topic, &thing.name),
        message: serde_json::to_string(&envelope)?,
        qos: PUBLISH_QOS as u8,
        retain,
    })
}
