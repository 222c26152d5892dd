//! Shard key policy: mapping record dates to monthly shard files.

use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;

use crate::{Error, Result};

/// Shard identifier for an ISO date: its `YYYY-MM` prefix.
///
/// Fails with [`Error::InvalidDate`] unless the input matches `YYYY-MM-DD`.
pub fn shard_key_of(date: &str) -> Result<String> {
    let re = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid regex");
    if !re.is_match(date) {
        return Err(Error::InvalidDate(date.to_string()));
    }
    Ok(date[..7].to_string())
}

/// Storage path for a shard: `<root>/<YYYY-MM>.json`.
#[must_use]
pub fn path_for(root: &str, shard_key: &str) -> String {
    format!("{}/{shard_key}.json", root.trim_end_matches('/'))
}

/// Candidate shard keys for reading: the month containing `today` and the
/// preceding `months - 1` months, newest first.
///
/// The store exposes no directory listing, so readers probe this bounded
/// window instead of enumerating.
#[must_use]
pub fn month_window(today: NaiveDate, months: u32) -> Vec<String> {
    let first_of_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    (0..months)
        .filter_map(|back| first_of_month.checked_sub_months(Months::new(back)))
        .map(|month| format!("{:04}-{:02}", month.year(), month.month()))
        .collect()
}
