//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for envelope times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current time as milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> i64 {
    now().timestamp_millis()
}
