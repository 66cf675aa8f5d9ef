//! Timestamp and identifier helpers shared by the storage backends.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ulid::Ulid;

/// Storage format for every timestamp column (`2026-01-31 14:05:00`).
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats an instant the way timestamp columns store it.
pub fn to_storage(ts: DateTime<Utc>) -> String {
    ts.format(STORAGE_DATE_FORMAT).to_string()
}

/// Parses the textual date shapes a caller is likely to hand over:
/// storage format, RFC 3339, or a bare `YYYY-MM-DD`.
pub fn parse_date_text(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(input, STORAGE_DATE_FORMAT) {
        return Some(Utc.from_utc_datetime(&ts));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| Utc.from_utc_datetime(&ts))
}

/// Unix-epoch seconds to a UTC instant.
pub fn from_epoch_secs(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

pub fn new_store_id() -> String {
    Ulid::new().to_string()
}
