//! Thought model

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::Record;
use crate::util::date_time_strings;

/// A short timestamped note.
///
/// `date` and `time` are derived once from `timestamp` at creation and never
/// recomputed. The id is the creation timestamp rendered as a string; two
/// thoughts created within the same millisecond would collide, which is
/// accepted for this data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thought {
    /// Creation timestamp as a string
    pub id: String,
    /// Plain text content
    pub text: String,
    /// Creation timestamp (Unix ms)
    pub timestamp: i64,
    /// Creation date, `YYYY-MM-DD`
    pub date: String,
    /// Creation time, `HH:MM:SS`
    pub time: String,
}

impl Thought {
    /// Create a new thought with the given text, stamped with the current
    /// local time.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let now = Local::now();
        let timestamp = now.timestamp_millis();
        let (date, time) = date_time_strings(&now);
        Self {
            id: timestamp.to_string(),
            text: text.into(),
            timestamp,
            date,
            time,
        }
    }

    /// Check if the text is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl Record for Thought {
    fn id(&self) -> &str {
        &self.id
    }

    fn date(&self) -> &str {
        &self.date
    }

    fn sort_key(&self) -> i64 {
        self.timestamp
    }
}
