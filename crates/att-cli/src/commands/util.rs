//! Shared helpers for command output.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Formats an instant as local wall-clock time for display.
pub fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_optional(instant: Option<DateTime<Utc>>, tz: Tz) -> String {
    instant.map_or_else(|| "-".to_string(), |instant| format_local(instant, tz))
}

/// Parses a local wall-clock time given on the command line.
///
/// Seconds are optional; `T` and a space are both accepted as separator.
pub fn parse_local(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .with_context(|| format!("invalid local time {value:?}, expected YYYY-MM-DD HH:MM"))
}
