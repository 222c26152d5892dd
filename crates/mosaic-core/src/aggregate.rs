//! Single-document aggregate storage with write coalescing.
//!
//! The check-in tracker mutates its state on nearly every interaction, so
//! each mutation schedules a delayed flush instead of a write: a new mutation
//! arriving before the timer fires cancels and restarts it, and only the last
//! state within a burst is ever sent.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::models::CheckinData;
use crate::pipeline::commit_files;
use crate::state::SyncState;
use crate::store::{ObjectStore, Oid};
use crate::Result;

const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Store for one aggregate document at a fixed path.
///
/// A pending flush lives only in memory; callers that need durability on
/// shutdown should await [`AggregateStore::flush_now`].
pub struct AggregateStore<T, S> {
    store: S,
    branch: String,
    path: String,
    debounce: Duration,
    pending: Arc<Mutex<Option<T>>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    flush_gate: Arc<AsyncMutex<()>>,
    state_tx: Arc<watch::Sender<SyncState>>,
}

impl<T, S: Clone> Clone for AggregateStore<T, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            branch: self.branch.clone(),
            path: self.path.clone(),
            debounce: self.debounce,
            pending: Arc::clone(&self.pending),
            timer: Arc::clone(&self.timer),
            flush_gate: Arc::clone(&self.flush_gate),
            state_tx: Arc::clone(&self.state_tx),
        }
    }
}

impl<T, S> AggregateStore<T, S>
where
    T: Serialize + DeserializeOwned,
    S: ObjectStore,
{
    pub fn new(store: S, branch: impl Into<String>, path: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Idle);
        Self {
            store,
            branch: branch.into(),
            path: path.into(),
            debounce: DEFAULT_DEBOUNCE,
            pending: Arc::new(Mutex::new(None)),
            timer: Arc::new(Mutex::new(None)),
            flush_gate: Arc::new(AsyncMutex::new(())),
            state_tx: Arc::new(state_tx),
        }
    }

    /// Override the debounce interval.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Observe the sync lifecycle of this document.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Fetch the document. Absence means "no data yet", not an error; a
    /// malformed document fails the whole read, there is no partial result.
    pub async fn load(&self) -> Result<Option<T>> {
        match self.store.read_path(&self.branch, &self.path).await? {
            None => Ok(None),
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
        }
    }

    /// Write the document immediately through the commit pipeline.
    pub async fn save(&self, value: &T) -> Result<Oid> {
        let json = serde_json::to_vec_pretty(value)?;
        self.state_tx.send_replace(SyncState::Syncing);
        let message = format!("Update {}", self.path);
        match commit_files(
            &self.store,
            &self.branch,
            &message,
            &[(self.path.clone(), json)],
        )
        .await
        {
            Ok(commit) => {
                self.state_tx.send_replace(SyncState::Synced);
                Ok(commit)
            }
            Err(error) => {
                self.state_tx.send_replace(SyncState::Error);
                Err(error)
            }
        }
    }
}

impl<T, S> AggregateStore<T, S>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    S: ObjectStore + Clone + 'static,
{
    /// Record `value` as the state to persist and (re)arm the debounce timer.
    ///
    /// Trailing-edge: only the last value scheduled within a burst is
    /// flushed. Must be called from within a tokio runtime.
    pub fn schedule_flush(&self, value: T) {
        *lock(&self.pending) = Some(value);
        self.state_tx.send_replace(SyncState::Pending);

        let mut timer = lock(&self.timer);
        if let Some(armed) = timer.take() {
            armed.abort();
        }
        // The deadline counts from the mutation, not from when the task is
        // first polled.
        let sleep = tokio::time::sleep(self.debounce);
        let this = self.clone();
        *timer = Some(tokio::spawn(async move {
            sleep.await;
            // Drop our own handle first so a mutation arriving from here on
            // cannot abort a flush that is already underway.
            lock(&this.timer).take();
            if let Err(error) = this.flush_pending().await {
                tracing::warn!("debounced flush of {} failed: {error}", this.path);
            }
        }));
    }

    /// Cancel any armed timer and flush the pending state immediately.
    ///
    /// Returns `None` when there was nothing pending.
    pub async fn flush_now(&self) -> Result<Option<Oid>> {
        if let Some(armed) = lock(&self.timer).take() {
            armed.abort();
        }
        self.flush_pending().await
    }

    async fn flush_pending(&self) -> Result<Option<Oid>> {
        // Single-flight: a timer firing while a flush is in flight waits here
        // instead of overlapping it.
        let _flight = self.flush_gate.lock().await;
        let Some(value) = lock(&self.pending).take() else {
            return Ok(None);
        };
        match self.save(&value).await {
            Ok(commit) => Ok(Some(commit)),
            Err(error) => {
                // Keep the state for a later retry unless a newer mutation
                // already superseded it.
                let mut pending = lock(&self.pending);
                if pending.is_none() {
                    *pending = Some(value);
                }
                Err(error)
            }
        }
    }
}

impl<S: ObjectStore> AggregateStore<CheckinData, S> {
    /// Store for the check-in aggregate document described by `config`.
    pub fn checkins(store: S, config: &SyncConfig) -> Self {
        let path = format!("{}/data.json", config.checkin_root.trim_end_matches('/'));
        Self::new(store, config.branch.clone(), path)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
