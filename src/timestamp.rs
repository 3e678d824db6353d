//! Flexible timestamp handling.
//!
//! Records carry their time as epoch seconds, epoch milliseconds, ISO strings
//! with or without an offset, or space-separated date-times. Everything is
//! parsed into a UTC instant; strings without an offset are read in the
//! configured local offset, as a browser in that zone would.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::record::{is_truthy, to_text};

/// Numbers above this are already milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;
/// Digit strings at least this long are milliseconds.
const MILLIS_DIGITS: usize = 13;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"];

fn from_millis(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms.round() as i64)
}

fn from_epoch_number(n: f64) -> Option<DateTime<Utc>> {
    let ms = if n > MILLIS_THRESHOLD { n } else { n * 1000.0 };
    from_millis(ms)
}

/// Parse a date-time string. `T` or a single space may separate date and time.
pub fn parse_str(raw: &str, local: FixedOffset) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let n: f64 = trimmed.parse().ok()?;
        let ms = if trimmed.len() >= MILLIS_DIGITS { n } else { n * 1000.0 };
        return from_millis(ms);
    }

    let candidate = trimmed.replacen(' ', "T", 1);

    if let Ok(dt) = DateTime::parse_from_rfc3339(&candidate) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return local
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    // Date-only ISO strings are midnight UTC
    NaiveDate::parse_from_str(&candidate, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a JSON value holding a timestamp.
pub fn parse_value(value: &Value, local: FixedOffset) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch_number),
        Value::String(s) => parse_str(s, local),
        _ => None,
    }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, the form the API expects for `lastTime`.
pub fn to_param(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Cursor form of a raw timestamp. Unparseable truthy values pass through.
pub fn format_param(value: &Value, local: FixedOffset) -> Option<String> {
    match parse_value(value, local) {
        Some(instant) => Some(to_param(&instant)),
        None => is_truthy(value).then(|| to_text(value)),
    }
}

/// `DD/MM/YYYY HH:MM` (24-hour) in the display offset.
///
/// Missing values render empty; unparseable values pass through as text.
pub fn format_display(value: &Value, display: FixedOffset) -> String {
    let zero = value.as_f64() == Some(0.0);
    if !is_truthy(value) && !zero {
        return String::new();
    }
    match parse_value(value, display) {
        Some(instant) => instant
            .with_timezone(&display)
            .format("%d/%m/%Y %H:%M")
            .to_string(),
        None => to_text(value),
    }
}
