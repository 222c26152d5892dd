//! Shared utility functions used across multiple modules.

use std::fmt;

use chrono::{DateTime, TimeZone};

/// Derive the `YYYY-MM-DD` and `HH:MM:SS` strings for an instant.
///
/// Records store these strings alongside the millisecond timestamp; they are
/// derived exactly once at creation and never recomputed afterwards.
pub fn date_time_strings<Tz: TimeZone>(datetime: &DateTime<Tz>) -> (String, String)
where
    Tz::Offset: fmt::Display,
{
    (
        datetime.format("%Y-%m-%d").to_string(),
        datetime.format("%H:%M:%S").to_string(),
    )
}
