//! Millisecond timestamps.
//!
//! The database stores every timestamp as integer milliseconds since the
//! Unix epoch; public types carry `DateTime<Utc>`. Conversion happens here
//! and nowhere else.

use chrono::{DateTime, Utc};

/// Current time as milliseconds since the epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts stored milliseconds into a UTC datetime.
///
/// Values outside chrono's representable range collapse to the epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Converts a UTC datetime into stored milliseconds.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
