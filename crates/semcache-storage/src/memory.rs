//! In-memory record store backed by an id-ordered map.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use semcache_core::{CacheRecord, Error, RecordPredicate, RecordStore, Result};

/// In-memory [`RecordStore`]. The `BTreeMap` keeps iteration in ascending
/// id order, which is the persisted order the cache's read paths rely on.
pub struct MemoryRecordStore<T> {
    records: RwLock<BTreeMap<u64, T>>,
}

impl<T> MemoryRecordStore<T> {
    /// Constructs an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T> Default for MemoryRecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: CacheRecord> RecordStore<T> for MemoryRecordStore<T> {
    async fn insert(&self, record: T) -> Result<()> {
        let mut records = self.records.write();
        let id = record.id();
        if records.contains_key(&id) {
            return Err(Error::already_exists("record", id));
        }
        records.insert(id, record);
        Ok(())
    }

    async fn update(&self, record: T) -> Result<()> {
        let mut records = self.records.write();
        let id = record.id();
        if !records.contains_key(&id) {
            return Err(Error::not_found("record", id));
        }
        records.insert(id, record);
        Ok(())
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
        Ok(self.records.write().remove(&id).is_some())
    }

    async fn delete_where(&self, predicate: RecordPredicate<'_, T>) -> Result<usize> {
        let mut records = self.records.write();
        let doomed: Vec<u64> = records
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            records.remove(id);
        }
        Ok(doomed.len())
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
        self.records.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semcache_core::ResultRecord;

    #[tokio::test]
    async fn find_all_returns_persisted_order() {
        let store = MemoryRecordStore::new();
        store
            .insert(ResultRecord::new(2, 2, 1, "b"))
            .await
            .unwrap();
        store
            .insert(ResultRecord::new(1, 1, 1, "a"))
            .await
            .unwrap();

        let all = store.find_all().await.unwrap();
        let ids: Vec<u64> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = MemoryRecordStore::new();
        store
            .insert(ResultRecord::new(1, 1, 1, "a"))
            .await
            .unwrap();
        let err = store
            .insert(ResultRecord::new(1, 2, 1, "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn delete_where_removes_only_matches() {
        let store = MemoryRecordStore::new();
        for id in 1..=4 {
            store
                .insert(ResultRecord::new(id, id, id % 2, "doc"))
                .await
                .unwrap();
        }

        let removed = store
            .delete_where(&|record: &ResultRecord| record.query_id == 0)
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.max_id().await.unwrap(), Some(3));
    }
}
