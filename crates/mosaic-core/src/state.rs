//! Shared sync state types.

/// Lifecycle of a debounced aggregate document between mutations and flushes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing pending, nothing in flight.
    #[default]
    Idle,
    /// A mutation is waiting for the debounce timer to fire.
    Pending,
    /// A write pipeline is in flight.
    Syncing,
    /// The last flush reached the remote store.
    Synced,
    /// The last flush failed; the pending state is retained for retry.
    Error,
}
