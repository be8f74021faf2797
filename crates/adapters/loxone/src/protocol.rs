//! Controller line protocol.
//!
//! One message per datagram, UTF-8, of the form
//!
//! ```text
//! <thing-key>=<thing> <property-key>=<property> <value-key>=<value>
//! ```
//!
//! | Part | Accepted keys (case-sensitive) |
//! |------|--------------------------------|
//! | thing | `thing`, `name`, `device`, `dev`, `d` |
//! | property | `property`, `key`, `k` |
//! | value | `value`, `val`, `v` |
//!
//! Captures are greedy and leftmost-first and never span a line break; the
//! value runs to the end of the line. The serializer always writes the canonical keys
//! `thing=`, `property=` and `value=`.

use std::sync::LazyLock;

use regex::Regex;

use smarthub_domain::message::DeviceMessage;

use crate::error::MalformedDatagram;

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:thing|name|device|dev|d)=(?P<thing>[^\r\n]*) (?:property|key|k)=(?P<property>[^\r\n]*) (?:value|val|v)=(?P<value>[^\r\n]*)$",
    )
    .expect("controller line grammar is a valid regex")
});

/// Parse one line into a [`DeviceMessage`].
///
/// A single trailing `\n` or `\r\n` is ignored. Any other carriage return or
/// line feed makes the line malformed.
///
/// # Errors
///
/// Returns [`MalformedDatagram::NoMatch`] when the line does not follow the
/// grammar.
pub fn parse_line(line: &str) -> Result<DeviceMessage, MalformedDatagram> {
    let line = line
        .strip_suffix('\n')
        .map_or(line, |rest| rest.strip_suffix('\r').unwrap_or(rest));

    let captures = LINE.captures(line).ok_or(MalformedDatagram::NoMatch)?;
    Ok(DeviceMessage::new(
        &captures["thing"],
        &captures["property"],
        &captures["value"],
    ))
}

/// Decode a raw datagram as UTF-8 and parse it.
///
/// # Errors
///
/// Returns [`MalformedDatagram::NotUtf8`] for invalid UTF-8 and
/// [`MalformedDatagram::NoMatch`] when the text does not follow the grammar.
pub fn parse_datagram(datagram: &[u8]) -> Result<DeviceMessage, MalformedDatagram> {
    let text = std::str::from_utf8(datagram).map_err(MalformedDatagram::NotUtf8)?;
    parse_line(text)
}

/// Serialize a message with the canonical keys.
#[must_use]
pub fn format_line(message: &DeviceMessage) -> String {
    format!(
        "thing={} property={} value={}",
        message.thing, message.property, message.value
    )
}
