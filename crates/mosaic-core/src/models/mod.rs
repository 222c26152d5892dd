//! Data models shared across the persistence layer

mod checkin;
mod thought;

pub use checkin::{CheckinData, CheckinEvent, CheckinPosition, CheckinRecord};
pub use thought::Thought;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A persisted item that can be assigned to a monthly shard.
///
/// `date` drives shard assignment, `sort_key` drives the newest-first
/// ordering of reconstructed collections.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable unique identifier.
    fn id(&self) -> &str;

    /// ISO `YYYY-MM-DD` date used for shard assignment.
    fn date(&self) -> &str;

    /// Descending-order key; larger values sort first.
    fn sort_key(&self) -> i64;
}
