//! Bounded cache of result documents, tagged by owning query id.

use std::sync::Arc;

use semcache_core::{RecordStore, Result, ResultRecord};

use crate::persistent::{BoundedCache, StoreOutcome};

/// Cache specialization for [`ResultRecord`]s.
pub struct ResultCache {
    inner: BoundedCache<ResultRecord>,
}

impl ResultCache {
    pub async fn open(
        store: Arc<dyn RecordStore<ResultRecord>>,
        capacity: usize,
    ) -> Result<Self> {
        Ok(Self {
            inner: BoundedCache::open(store, capacity).await?,
        })
    }

    /// Stores one serialized result document for the given owning query.
    pub async fn store(&mut self, document: &str, query_id: u64) -> Result<StoreOutcome> {
        let document = document.to_owned();
        self.inner
            .store(move |id, timestamp| ResultRecord::new(id, timestamp, query_id, document))
            .await
    }

    /// All results owned by `query_id`, in persisted order.
    pub async fn load_for_query(&self, query_id: u64) -> Result<Vec<ResultRecord>> {
        self.inner
            .load_where(&move |record: &ResultRecord| record.query_id == query_id)
            .await
    }

    /// Cascading delete: removes every result owned by `query_id`.
    pub async fn remove_for_query(&mut self, query_id: u64) -> Result<usize> {
        self.inner
            .remove_where(&move |record: &ResultRecord| record.query_id == query_id)
            .await
    }

    pub async fn update_access_time(&mut self, id: u64) -> Result<()> {
        self.inner.update_access_time(id).await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.inner.clear().await
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
