//! Field coercion for untrusted record values
//!
//! None of these fail: anything unusable becomes the field's unset state
//! or the supplied default.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use shared::util::{clean, sanitize_key};
use std::str::FromStr;

/// Cleaned text, empty when absent
pub fn text(raw: Option<&str>) -> String {
    raw.map(clean).unwrap_or_default()
}

/// Decimal amount; empty or unparsable input is unset
pub fn decimal(raw: Option<&str>) -> Option<Decimal> {
    let value = clean(raw?);
    if value.is_empty() {
        return None;
    }
    Decimal::from_str(&value)
        .or_else(|_| Decimal::from_scientific(&value))
        .ok()
}

/// Point in time from RFC 3339, `YYYY-mm-dd HH:MM:SS`, `YYYY-mm-dd` or a
/// Unix timestamp in seconds. Naive values are taken as UTC.
pub fn datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    if value.bytes().all(|b| b.is_ascii_digit()) {
        return value
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    }
    None
}

/// Enum field through `sanitize_key`, falling back to `default`
pub fn key_or<T>(raw: Option<&str>, parse: fn(&str) -> Option<T>, default: T) -> T {
    raw.map(sanitize_key)
        .and_then(|key| parse(&key))
        .unwrap_or(default)
}
