//! One-time migration of legacy local-only check-in state.
//!
//! Earlier builds kept the tracker's events, records, and card positions as
//! three local cache entries. On startup, before normal reads, this state is
//! pushed to the remote store once - and only if the remote store reports no
//! existing document. The cache is cleared strictly after the remote write is
//! confirmed, so a failed write never loses data.

use serde::de::DeserializeOwned;

use crate::aggregate::AggregateStore;
use crate::cache::LocalCache;
use crate::models::CheckinData;
use crate::store::ObjectStore;
use crate::Result;

/// Legacy cache key holding the event list.
pub const LEGACY_EVENTS_KEY: &str = "checkin-events";
/// Legacy cache key holding the check-in records.
pub const LEGACY_RECORDS_KEY: &str = "checkin-records";
/// Legacy cache key holding the card positions.
pub const LEGACY_POSITIONS_KEY: &str = "checkin-positions";

/// What a migration run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Legacy state was pushed as the initial remote document and the cache
    /// was cleared.
    Migrated,
    /// The remote document already exists; it stays authoritative regardless
    /// of local cache content.
    RemoteAlreadyPresent,
    /// Neither remote nor local data exists.
    NothingToMigrate,
}

/// Coordinates the one-time local-to-remote transfer.
pub struct MigrationCoordinator<S, C> {
    aggregate: AggregateStore<CheckinData, S>,
    cache: C,
}

impl<S, C> MigrationCoordinator<S, C>
where
    S: ObjectStore,
    C: LocalCache,
{
    pub fn new(aggregate: AggregateStore<CheckinData, S>, cache: C) -> Self {
        Self { aggregate, cache }
    }

    /// Run the migration if the remote store holds no document yet.
    ///
    /// Idempotent: once a remote document exists, every later run is a no-op.
    /// A failed remote existence check is propagated so the caller can retry
    /// the whole startup sequence rather than assume "no remote data".
    pub async fn migrate_if_needed(&self) -> Result<MigrationOutcome> {
        if self.aggregate.load().await?.is_some() {
            return Ok(MigrationOutcome::RemoteAlreadyPresent);
        }

        let data = self.load_legacy();
        if data.is_empty() {
            return Ok(MigrationOutcome::NothingToMigrate);
        }

        self.aggregate.save(&data).await?;
        tracing::info!("migrated legacy local check-in state to the remote store");

        // Remote durability is confirmed; the local copy is now disposable.
        self.cache.remove(LEGACY_EVENTS_KEY)?;
        self.cache.remove(LEGACY_RECORDS_KEY)?;
        self.cache.remove(LEGACY_POSITIONS_KEY)?;
        Ok(MigrationOutcome::Migrated)
    }

    fn load_legacy(&self) -> CheckinData {
        CheckinData {
            events: legacy_entry(&self.cache, LEGACY_EVENTS_KEY),
            records: legacy_entry(&self.cache, LEGACY_RECORDS_KEY),
            positions: legacy_entry(&self.cache, LEGACY_POSITIONS_KEY),
        }
    }
}

/// Read one legacy entry, treating anything unusable as empty. The cache is
/// left untouched either way.
fn legacy_entry<C: LocalCache, T: DeserializeOwned + Default>(cache: &C, key: &str) -> T {
    match cache.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!("ignoring malformed legacy cache entry {key}: {error}");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(error) => {
            tracing::warn!("failed to read legacy cache entry {key}: {error}");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::SyncConfig;
    use crate::store::memory::FailPoint;
    use crate::store::MemoryStore;
    use crate::Error;

    fn coordinator(
        backend: &MemoryStore,
        cache: &MemoryCache,
    ) -> MigrationCoordinator<MemoryStore, MemoryCache> {
        MigrationCoordinator::new(
            AggregateStore::checkins(backend.clone(), &SyncConfig::default()),
            cache.clone(),
        )
    }

    fn seed_legacy_event(cache: &MemoryCache) {
        cache
            .set(
                LEGACY_EVENTS_KEY,
                r##"[{"id": "e1", "name": "Run", "color": "#ff0000"}]"##,
            )
            .unwrap();
    }

    #[tokio::test]
    async fn local_state_is_pushed_once_then_cleared() {
        let backend = MemoryStore::with_branch("main");
        let cache = MemoryCache::new();
        seed_legacy_event(&cache);
        cache.set(LEGACY_RECORDS_KEY, r#"[{"date": "2024-01-15", "eventId": "e1"}]"#)
            .unwrap();

        let outcome = coordinator(&backend, &cache).migrate_if_needed().await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated);

        let remote: CheckinData = serde_json::from_str(
            &backend.file("main", "data/checkin/data.json").unwrap(),
        )
        .unwrap();
        assert_eq!(remote.events[0].name, "Run");
        assert!(remote.is_checked("2024-01-15", "e1"));

        assert_eq!(cache.get(LEGACY_EVENTS_KEY).unwrap(), None);
        assert_eq!(cache.get(LEGACY_RECORDS_KEY).unwrap(), None);
        assert_eq!(cache.get(LEGACY_POSITIONS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let backend = MemoryStore::with_branch("main");
        let cache = MemoryCache::new();
        seed_legacy_event(&cache);
        let coordinator = coordinator(&backend, &cache);

        assert_eq!(
            coordinator.migrate_if_needed().await.unwrap(),
            MigrationOutcome::Migrated
        );
        assert_eq!(
            coordinator.migrate_if_needed().await.unwrap(),
            MigrationOutcome::RemoteAlreadyPresent
        );
        // init + exactly one migration write
        assert_eq!(backend.commit_count("main"), 2);
    }

    #[tokio::test]
    async fn existing_remote_document_wins_over_local_cache() {
        let backend = MemoryStore::with_branch("main");
        backend
            .seed_file("main", "data/checkin/data.json", "{}")
            .unwrap();
        let cache = MemoryCache::new();
        seed_legacy_event(&cache);

        let outcome = coordinator(&backend, &cache).migrate_if_needed().await.unwrap();
        assert_eq!(outcome, MigrationOutcome::RemoteAlreadyPresent);
        // The cache is left alone: nothing was migrated.
        assert!(cache.get(LEGACY_EVENTS_KEY).unwrap().is_some());
        assert_eq!(backend.file("main", "data/checkin/data.json").unwrap(), "{}");
    }

    #[tokio::test]
    async fn empty_cache_means_nothing_to_migrate() {
        let backend = MemoryStore::with_branch("main");
        let cache = MemoryCache::new();

        let outcome = coordinator(&backend, &cache).migrate_if_needed().await.unwrap();
        assert_eq!(outcome, MigrationOutcome::NothingToMigrate);
        assert_eq!(backend.commit_count("main"), 1);
    }

    #[tokio::test]
    async fn malformed_cache_entry_is_ignored_and_kept() {
        let backend = MemoryStore::with_branch("main");
        let cache = MemoryCache::new();
        cache.set(LEGACY_EVENTS_KEY, "{not json").unwrap();

        let outcome = coordinator(&backend, &cache).migrate_if_needed().await.unwrap();
        assert_eq!(outcome, MigrationOutcome::NothingToMigrate);
        assert!(cache.get(LEGACY_EVENTS_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn remote_check_failure_is_soft() {
        let backend = MemoryStore::with_branch("main");
        backend.fail_once(
            FailPoint::ReadPath,
            Error::Network("connection reset".to_string()),
        );
        let cache = MemoryCache::new();
        seed_legacy_event(&cache);

        let result = coordinator(&backend, &cache).migrate_if_needed().await;
        assert!(matches!(result, Err(Error::Network(_))));
        // Nothing written, nothing cleared; the caller retries later.
        assert_eq!(backend.commit_count("main"), 1);
        assert!(cache.get(LEGACY_EVENTS_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_push_never_clears_the_cache() {
        let backend = MemoryStore::with_branch("main");
        let cache = MemoryCache::new();
        seed_legacy_event(&cache);
        backend.reject_updates(crate::pipeline::MAX_REF_ATTEMPTS);

        let result = coordinator(&backend, &cache).migrate_if_needed().await;
        assert!(matches!(result, Err(Error::RefConflict(_))));
        assert!(cache.get(LEGACY_EVENTS_KEY).unwrap().is_some());

        // A later run succeeds and only then clears the cache.
        let outcome = coordinator(&backend, &cache).migrate_if_needed().await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated);
        assert_eq!(cache.get(LEGACY_EVENTS_KEY).unwrap(), None);
    }

    #[test]
    fn migrated_positions_survive_the_round_trip() {
        let cache = MemoryCache::new();
        cache
            .set(LEGACY_POSITIONS_KEY, r#"{"e1": {"x": 10.0, "y": -4.0}}"#)
            .unwrap();

        let positions: std::collections::BTreeMap<String, crate::models::CheckinPosition> =
            legacy_entry(&cache, LEGACY_POSITIONS_KEY);
        assert_eq!(positions["e1"].x, 10.0);
        assert_eq!(positions["e1"].y, -4.0);
    }
}
