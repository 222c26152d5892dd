//! Check-in tracker models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A trackable habit or event.
///
/// Missing `start`/`end` mean the event is open-ended on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinEvent {
    pub id: String,
    pub name: String,
    /// Display color, e.g. `#ff0000`
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl CheckinEvent {
    /// Whether the event is active on the given `YYYY-MM-DD` date.
    ///
    /// The interval is closed on both sides; ISO dates compare correctly as
    /// strings.
    #[must_use]
    pub fn is_active_on(&self, date: &str) -> bool {
        match (&self.start, &self.end) {
            (None, None) => true,
            (Some(start), None) => date >= start.as_str(),
            (None, Some(end)) => date <= end.as_str(),
            (Some(start), Some(end)) => date >= start.as_str() && date <= end.as_str(),
        }
    }
}

/// Presence of a record for `(date, eventId)` means "checked in".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub date: String,
    #[serde(rename = "eventId")]
    pub event_id: String,
}

/// Last persisted drag offset for an event card. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckinPosition {
    pub x: f64,
    pub y: f64,
}

/// The complete check-in state, persisted as one aggregate document.
///
/// Once this document exists remotely it is the sole source of truth; any
/// local cache is a disposable mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckinData {
    #[serde(default)]
    pub events: Vec<CheckinEvent>,
    #[serde(default)]
    pub records: Vec<CheckinRecord>,
    #[serde(default)]
    pub positions: BTreeMap<String, CheckinPosition>,
}

impl CheckinData {
    /// Whether a check-in exists for the event on the given date.
    #[must_use]
    pub fn is_checked(&self, date: &str, event_id: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.date == date && record.event_id == event_id)
    }

    /// Toggle the check-in for the event on the given date.
    pub fn toggle(&mut self, date: &str, event_id: &str) {
        if let Some(index) = self
            .records
            .iter()
            .position(|record| record.date == date && record.event_id == event_id)
        {
            self.records.remove(index);
        } else {
            self.records.push(CheckinRecord {
                date: date.to_string(),
                event_id: event_id.to_string(),
            });
        }
    }

    pub fn add_event(&mut self, event: CheckinEvent) {
        self.events.push(event);
    }

    /// Remove an event and its card position.
    ///
    /// Records referencing the id are left in place; dangling references are
    /// tolerated on read.
    pub fn remove_event(&mut self, event_id: &str) {
        self.events.retain(|event| event.id != event_id);
        self.positions.remove(event_id);
    }

    pub fn set_position(&mut self, event_id: &str, x: f64, y: f64) {
        self.positions
            .insert(event_id.to_string(), CheckinPosition { x, y });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.records.is_empty() && self.positions.is_empty()
    }
}
