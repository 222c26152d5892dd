//! Sharded collection storage.
//!
//! A logical collection (e.g. thoughts) is split into one JSON file per
//! calendar month so no single write grows unbounded. Writes rewrite the full
//! content of every touched shard; reads probe a bounded month window and
//! reassemble the collection newest-first, tolerating absent or corrupt
//! shards.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use chrono::{Local, NaiveDate};

use crate::config::SyncConfig;
use crate::models::{Record, Thought};
use crate::pipeline::commit_files;
use crate::shard::{month_window, path_for, shard_key_of};
use crate::store::{ObjectStore, Oid};
use crate::Result;

/// Which shards changed since the last successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangedShards {
    /// Rewrite every shard the collection currently occupies.
    All,
    /// Rewrite exactly these shard keys; a key whose records all disappeared
    /// is rewritten as an empty array.
    Keys(BTreeSet<String>),
}

impl ChangedShards {
    /// Convenience constructor from the dates of mutated records.
    pub fn from_dates<'a>(dates: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut keys = BTreeSet::new();
        for date in dates {
            keys.insert(shard_key_of(date)?);
        }
        Ok(Self::Keys(keys))
    }
}

/// Store for one sharded collection of records.
pub struct ShardedStore<R, S> {
    store: S,
    branch: String,
    root: String,
    probe_months: u32,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, S: ObjectStore> ShardedStore<R, S> {
    pub fn new(
        store: S,
        branch: impl Into<String>,
        root: impl Into<String>,
        probe_months: u32,
    ) -> Self {
        Self {
            store,
            branch: branch.into(),
            root: root.into(),
            probe_months,
            _record: PhantomData,
        }
    }

    /// Durably persist the collection by rewriting its changed shards.
    ///
    /// Takes the full in-memory collection, not a delta: every touched shard
    /// ships its complete post-mutation record array. An empty collection is
    /// persisted as a single placeholder file so the collection path still
    /// resolves. Returns the new head commit, or `None` when there was
    /// nothing to write.
    pub async fn push(&self, records: &[R], changed: &ChangedShards) -> Result<Option<Oid>> {
        let mut by_shard: BTreeMap<String, Vec<&R>> = BTreeMap::new();
        for record in records {
            by_shard
                .entry(shard_key_of(record.date())?)
                .or_default()
                .push(record);
        }

        let keys: Vec<String> = match changed {
            ChangedShards::All => by_shard.keys().cloned().collect(),
            ChangedShards::Keys(keys) => keys.iter().cloned().collect(),
        };

        let mut files = Vec::with_capacity(keys.len());
        for key in &keys {
            let shard_records = by_shard.get(key).map_or(&[][..], Vec::as_slice);
            files.push((
                path_for(&self.root, key),
                serde_json::to_vec_pretty(&shard_records)?,
            ));
        }
        if by_shard.is_empty() {
            files.push((format!("{}/.gitkeep", self.root.trim_end_matches('/')), Vec::new()));
        }
        if files.is_empty() {
            return Ok(None);
        }

        let message = if keys.is_empty() {
            format!("Update {}: empty collection placeholder", self.root)
        } else {
            format!("Update {}: {}", self.root, keys.join(", "))
        };
        let commit = commit_files(&self.store, &self.branch, &message, &files).await?;
        Ok(Some(commit))
    }

    /// Reconstruct the collection, newest-first.
    pub async fn fetch(&self) -> Vec<R> {
        self.fetch_as_of(Local::now().date_naive()).await
    }

    /// Reconstruct the collection probing the window ending at `today`.
    ///
    /// Public for testability. Absent shards are skipped silently; unreadable
    /// or malformed shards are logged and skipped, since partial results are
    /// preferable to total failure.
    pub async fn fetch_as_of(&self, today: NaiveDate) -> Vec<R> {
        let mut records = Vec::new();
        for key in month_window(today, self.probe_months) {
            let path = path_for(&self.root, &key);
            match self.store.read_path(&self.branch, &path).await {
                Ok(None) => {}
                Ok(Some(content)) => match serde_json::from_str::<Vec<R>>(&content) {
                    Ok(mut shard) => records.append(&mut shard),
                    Err(error) => {
                        tracing::warn!("skipping malformed shard {path}: {error}");
                    }
                },
                Err(error) => {
                    tracing::warn!("skipping unreadable shard {path}: {error}");
                }
            }
        }
        records.sort_by_key(|record| std::cmp::Reverse(record.sort_key()));
        records
    }
}

impl<S: ObjectStore> ShardedStore<Thought, S> {
    /// Store for the thoughts collection described by `config`.
    pub fn thoughts(store: S, config: &SyncConfig) -> Self {
        Self::new(
            store,
            config.branch.clone(),
            config.thoughts_root.clone(),
            config.probe_months,
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::memory::FailPoint;
    use crate::store::MemoryStore;
    use crate::Error;

    fn thought(id: i64, text: &str, date: &str, time: &str) -> Thought {
        Thought {
            id: id.to_string(),
            text: text.to_string(),
            timestamp: id,
            date: date.to_string(),
            time: time.to_string(),
        }
    }

    fn store() -> ShardedStore<Thought, MemoryStore> {
        ShardedStore::thoughts(MemoryStore::with_branch("main"), &SyncConfig::default())
    }

    fn november() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 11, 20).unwrap()
    }

    #[tokio::test]
    async fn round_trip_preserves_every_field() {
        let sharded = store();
        let written = thought(1_700_000_000_000, "hi", "2023-11-15", "06:13:20");

        sharded
            .push(std::slice::from_ref(&written), &ChangedShards::All)
            .await
            .unwrap();

        let fetched = sharded.fetch_as_of(november()).await;
        assert_eq!(fetched, vec![written]);
    }

    #[tokio::test]
    async fn records_land_in_their_month_shard() {
        let backend = MemoryStore::with_branch("main");
        let sharded = ShardedStore::thoughts(backend.clone(), &SyncConfig::default());

        let records = vec![
            thought(1_700_000_000_000, "hi", "2023-11-15", "06:13:20"),
            thought(1_701_500_000_000, "later", "2023-12-02", "14:53:20"),
        ];
        sharded.push(&records, &ChangedShards::All).await.unwrap();

        let november_shard = backend.file("main", "data/thoughts/2023-11.json").unwrap();
        assert!(november_shard.contains("\"hi\""));
        assert!(!november_shard.contains("\"later\""));
        assert!(backend.file("main", "data/thoughts/2023-12.json").is_some());
        assert_eq!(
            backend.head_message("main").unwrap(),
            "Update data/thoughts: 2023-11, 2023-12"
        );
    }

    #[tokio::test]
    async fn changed_keys_limit_what_is_rewritten() {
        let backend = MemoryStore::with_branch("main");
        let sharded = ShardedStore::thoughts(backend.clone(), &SyncConfig::default());

        let records = vec![
            thought(1_700_000_000_000, "hi", "2023-11-15", "06:13:20"),
            thought(1_701_500_000_000, "later", "2023-12-02", "14:53:20"),
        ];
        let changed = ChangedShards::from_dates(["2023-12-02"]).unwrap();
        sharded.push(&records, &changed).await.unwrap();

        assert!(backend.file("main", "data/thoughts/2023-11.json").is_none());
        assert!(backend.file("main", "data/thoughts/2023-12.json").is_some());
    }

    #[tokio::test]
    async fn emptied_shard_is_rewritten_as_empty_array() {
        let backend = MemoryStore::with_branch("main");
        let sharded = ShardedStore::thoughts(backend.clone(), &SyncConfig::default());

        let november = thought(1_700_000_000_000, "hi", "2023-11-15", "06:13:20");
        let december = thought(1_701_500_000_000, "later", "2023-12-02", "14:53:20");
        sharded
            .push(&[november, december.clone()], &ChangedShards::All)
            .await
            .unwrap();

        // The November thought was deleted; its shard is shipped as [].
        let changed = ChangedShards::from_dates(["2023-11-15"]).unwrap();
        sharded.push(&[december], &changed).await.unwrap();

        let shard = backend.file("main", "data/thoughts/2023-11.json").unwrap();
        let parsed: Vec<Thought> = serde_json::from_str(&shard).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn empty_collection_writes_placeholder() {
        let backend = MemoryStore::with_branch("main");
        let sharded: ShardedStore<Thought, _> =
            ShardedStore::thoughts(backend.clone(), &SyncConfig::default());

        let commit = sharded.push(&[], &ChangedShards::All).await.unwrap();
        assert!(commit.is_some());
        assert_eq!(backend.file("main", "data/thoughts/.gitkeep").unwrap(), "");
    }

    #[tokio::test]
    async fn nothing_changed_is_a_no_op() {
        let backend = MemoryStore::with_branch("main");
        let sharded = ShardedStore::thoughts(backend.clone(), &SyncConfig::default());
        let records = vec![thought(1_700_000_000_000, "hi", "2023-11-15", "06:13:20")];

        let commit = sharded
            .push(&records, &ChangedShards::Keys(BTreeSet::new()))
            .await
            .unwrap();
        assert_eq!(commit, None);
        assert_eq!(backend.commit_count("main"), 1);
    }

    #[tokio::test]
    async fn invalid_record_date_fails_before_any_write() {
        let backend = MemoryStore::with_branch("main");
        let sharded = ShardedStore::thoughts(backend.clone(), &SyncConfig::default());
        let records = vec![thought(1, "bad", "15/11/2023", "06:13:20")];

        let result = sharded.push(&records, &ChangedShards::All).await;
        assert!(matches!(result, Err(Error::InvalidDate(_))));
        assert_eq!(backend.commit_count("main"), 1);
    }

    #[tokio::test]
    async fn fetch_merges_shards_newest_first() {
        let sharded = store();
        let records = vec![
            thought(1_700_000_000_000, "mid", "2023-11-15", "06:13:20"),
            thought(1_701_500_000_000, "new", "2023-12-02", "14:53:20"),
            thought(1_696_000_000_000, "old", "2023-09-29", "15:06:40"),
        ];
        sharded.push(&records, &ChangedShards::All).await.unwrap();

        let fetched = sharded
            .fetch_as_of(NaiveDate::from_ymd_opt(2023, 12, 10).unwrap())
            .await;
        let texts: Vec<&str> = fetched.iter().map(|thought| thought.text.as_str()).collect();
        assert_eq!(texts, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn fetch_skips_corrupt_shards() {
        let backend = MemoryStore::with_branch("main");
        let sharded = ShardedStore::thoughts(backend.clone(), &SyncConfig::default());

        let good = thought(1_700_000_000_000, "hi", "2023-11-15", "06:13:20");
        sharded
            .push(std::slice::from_ref(&good), &ChangedShards::All)
            .await
            .unwrap();
        backend
            .seed_file("main", "data/thoughts/2023-10.json", "{not json")
            .unwrap();

        let fetched = sharded.fetch_as_of(november()).await;
        assert_eq!(fetched, vec![good]);
    }

    #[tokio::test]
    async fn fetch_continues_past_read_errors() {
        let backend = MemoryStore::with_branch("main");
        let sharded = ShardedStore::thoughts(backend.clone(), &SyncConfig::default());

        let good = thought(1_697_400_000_000, "hi", "2023-10-15", "21:20:00");
        sharded
            .push(std::slice::from_ref(&good), &ChangedShards::All)
            .await
            .unwrap();
        // The first probe (current month) fails; later probes still run.
        backend.fail_once(
            FailPoint::ReadPath,
            Error::Network("connection reset".to_string()),
        );

        let fetched = sharded.fetch_as_of(november()).await;
        assert_eq!(fetched, vec![good]);
    }

    #[tokio::test]
    async fn fetch_ignores_shards_outside_the_window() {
        let sharded = store();
        let records = vec![
            thought(1_700_000_000_000, "recent", "2023-11-15", "06:13:20"),
            thought(1_600_000_000_000, "ancient", "2020-09-13", "12:26:40"),
        ];
        sharded.push(&records, &ChangedShards::All).await.unwrap();

        let fetched = sharded.fetch_as_of(november()).await;
        let texts: Vec<&str> = fetched.iter().map(|thought| thought.text.as_str()).collect();
        assert_eq!(texts, vec!["recent"]);
    }
}
