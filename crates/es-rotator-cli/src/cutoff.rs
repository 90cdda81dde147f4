//! Parsing of `--older-than` values.

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a cutoff given as RFC 3339, a plain `YYYY-MM-DD` date (midnight
/// UTC), or epoch seconds.
pub fn parse_cutoff(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| format!("epoch seconds out of range: {value}"));
    }
    if let Ok(when) = DateTime::parse_from_rfc3339(value) {
        return Ok(when.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("expected RFC 3339, YYYY-MM-DD or epoch seconds, got {value:?}"))
}
