//! mosaic-core - Persistence layer for the Mosaic dashboard
//!
//! Keeps small, frequently-mutated JSON collections (timestamped thoughts and
//! the check-in tracker's aggregate state) durable in a remote,
//! version-controlled, content-addressable object store reachable only
//! through blob/tree/commit/ref primitives. The UI layers sit on top of this
//! crate and are not part of it.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod shard;
pub mod sharded;
pub mod state;
pub mod store;
pub mod util;

pub use aggregate::AggregateStore;
pub use cache::{FileCache, LocalCache, MemoryCache};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use migrate::{MigrationCoordinator, MigrationOutcome};
pub use models::{CheckinData, CheckinEvent, CheckinPosition, CheckinRecord, Record, Thought};
pub use sharded::{ChangedShards, ShardedStore};
pub use state::SyncState;
pub use store::{MemoryStore, ObjectStore, Oid, TreeEntry};
