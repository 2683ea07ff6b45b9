//! File-backed record store: a JSON snapshot rewritten after every
//! mutation and reloaded on open.
//!
//! Snapshot-per-mutation is deliberate: the cache is small and bounded, so
//! a full rewrite stays cheap, and reopening a store always observes the
//! last completed mutation. Reloading also restores the maximum persisted
//! id, which the bounded cache uses to keep ids from being reused across
//! restarts.
//!
//! Mutations serialize the snapshot while the map guard is held and write
//! it with `tokio::fs` after the guard is released, so disk latency never
//! stalls a worker thread or other readers. Concurrent mutators could race
//! the two writes; the caches own their store exclusively, so mutations
//! arrive one at a time.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use semcache_core::{CacheRecord, Error, RecordPredicate, RecordStore, Result};

/// [`RecordStore`] persisted as a JSON array in a single file.
pub struct JsonFileRecordStore<T> {
    path: PathBuf,
    records: RwLock<BTreeMap<u64, T>>,
}

impl<T> JsonFileRecordStore<T>
where
    T: CacheRecord + Serialize + DeserializeOwned,
{
    /// Opens the store, loading any snapshot already on disk. The parent
    /// directory is created if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut records = BTreeMap::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => {
                let loaded: Vec<T> = serde_json::from_str(&data).map_err(|e| {
                    Error::storage(format!("corrupt snapshot {}: {e}", path.display()))
                })?;
                for record in loaded {
                    records.insert(record.id(), record);
                }
                debug!(path = %path.display(), records = records.len(), "loaded record snapshot");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(records: &BTreeMap<u64, T>) -> Result<Vec<u8>> {
        let ordered: Vec<&T> = records.values().collect();
        serde_json::to_vec(&ordered).map_err(|e| Error::Serialization(e.to_string()))
    }

    async fn persist(&self, snapshot: Vec<u8>) -> Result<()> {
        tokio::fs::write(&self.path, snapshot).await?;
        Ok(())
    }
}

#[async_trait]
impl<T> RecordStore<T> for JsonFileRecordStore<T>
where
    T: CacheRecord + Serialize + DeserializeOwned,
{
    async fn insert(&self, record: T) -> Result<()> {
        let snapshot = {
            let mut records = self.records.write();
            let id = record.id();
            if records.contains_key(&id) {
                return Err(Error::already_exists("record", id));
            }
            records.insert(id, record);
            Self::snapshot(&records)?
        };
        self.persist(snapshot).await
    }

    async fn update(&self, record: T) -> Result<()> {
        let snapshot = {
            let mut records = self.records.write();
            let id = record.id();
            if !records.contains_key(&id) {
                return Err(Error::not_found("record", id));
            }
            records.insert(id, record);
            Self::snapshot(&records)?
        };
        self.persist(snapshot).await
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        Ok(self.records.read().values().cloned().collect())
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<T>> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn find_where(&self, predicate: RecordPredicate<'_, T>) -> Result<Vec<T>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect())
    }

    async fn delete_by_id(&self, id: u64) -> Result<bool> {
        let snapshot = {
            let mut records = self.records.write();
            if records.remove(&id).is_none() {
                return Ok(false);
            }
            Self::snapshot(&records)?
        };
        self.persist(snapshot).await?;
        Ok(true)
    }

    async fn delete_where(&self, predicate: RecordPredicate<'_, T>) -> Result<usize> {
        let (snapshot, removed) = {
            let mut records = self.records.write();
            let doomed: Vec<u64> = records
                .iter()
                .filter(|(_, record)| predicate(record))
                .map(|(id, _)| *id)
                .collect();
            if doomed.is_empty() {
                return Ok(0);
            }
            for id in &doomed {
                records.remove(id);
            }
            (Self::snapshot(&records)?, doomed.len())
        };
        self.persist(snapshot).await?;
        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    async fn max_id(&self) -> Result<Option<u64>> {
        Ok(self.records.read().keys().next_back().copied())
    }

    async fn max_timestamp(&self) -> Result<Option<u64>> {
        Ok(self.records.read().values().map(CacheRecord::timestamp).max())
    }

    async fn clear(&self) -> Result<()> {
        let snapshot = {
            let mut records = self.records.write();
            records.clear();
            Self::snapshot(&records)?
        };
        self.persist(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use semcache_core::QueryRecord;

    #[tokio::test]
    async fn reopen_restores_records_and_max_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.json");

        {
            let store = JsonFileRecordStore::open(&path).await.unwrap();
            store
                .insert(QueryRecord::new(1, 1, "[]"))
                .await
                .unwrap();
            store
                .insert(QueryRecord::new(5, 2, "[]"))
                .await
                .unwrap();
        }

        let reopened: JsonFileRecordStore<QueryRecord> =
            JsonFileRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert_eq!(reopened.max_id().await.unwrap(), Some(5));
        assert_eq!(reopened.max_timestamp().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn delete_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let store = JsonFileRecordStore::open(&path).await.unwrap();
        store.insert(QueryRecord::new(1, 1, "[]")).await.unwrap();
        store.insert(QueryRecord::new(2, 2, "[]")).await.unwrap();
        assert!(store.delete_by_id(1).await.unwrap());

        let reopened: JsonFileRecordStore<QueryRecord> =
            JsonFileRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert!(reopened.find_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_and_clear_rewrite_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.json");

        let store = JsonFileRecordStore::open(&path).await.unwrap();
        store.insert(QueryRecord::new(1, 1, "[]")).await.unwrap();
        store.update(QueryRecord::new(1, 9, "[]")).await.unwrap();

        let reopened: JsonFileRecordStore<QueryRecord> =
            JsonFileRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.max_timestamp().await.unwrap(), Some(9));

        reopened.clear().await.unwrap();
        let cleared: JsonFileRecordStore<QueryRecord> =
            JsonFileRecordStore::open(&path).await.unwrap();
        assert_eq!(cleared.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reads_proceed_while_a_mutation_awaits_its_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.json");

        let store = Arc::new(JsonFileRecordStore::open(&path).await.unwrap());
        store.insert(QueryRecord::new(1, 1, "[]")).await.unwrap();

        // the map guard is released before the file write awaits, so a
        // reader task never waits on disk I/O
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.count().await })
        };
        store.insert(QueryRecord::new(2, 2, "[]")).await.unwrap();
        assert!(reader.await.unwrap().unwrap() >= 1);
    }
}
