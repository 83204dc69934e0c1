//! Timestamp formatting helpers.
//!
//! The backend timestamps everything in Unix epoch milliseconds (UTC); the
//! client only ever formats them for display.

/// Convert a Unix timestamp (milliseconds, UTC) to RFC 3339 format
pub fn millis_to_rfc3339(timestamp_millis: i64) -> String {
    let seconds = timestamp_millis / 1000;
    let nanos = ((timestamp_millis % 1000) * 1_000_000) as u32;
    match chrono::DateTime::from_timestamp(seconds, nanos) {
        Some(dt) => dt.to_rfc3339(),
        None => String::from("invalid timestamp"),
    }
}
