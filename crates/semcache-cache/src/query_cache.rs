//! Bounded cache of query texts with exact and coverage-based probing.

use std::sync::Arc;

use tracing::debug;

use semcache_core::{Error, QueryRecord, RecordStore, Result};
use semcache_query::{parse_query, Query};

use crate::persistent::{BoundedCache, StoreOutcome};

/// Cache specialization for [`QueryRecord`]s.
pub struct QueryCache {
    inner: BoundedCache<QueryRecord>,
}

impl QueryCache {
    pub async fn open(store: Arc<dyn RecordStore<QueryRecord>>, capacity: usize) -> Result<Self> {
        Ok(Self {
            inner: BoundedCache::open(store, capacity).await?,
        })
    }

    /// Stores a query text, evicting the LRU query when full. The caller
    /// is responsible for cascading the eviction to dependent results.
    pub async fn store(
        &mut self,
        query_text: &str,
        source_file: Option<&str>,
    ) -> Result<StoreOutcome> {
        let text = query_text.to_owned();
        let file = source_file.map(str::to_owned);
        self.inner
            .store(move |id, timestamp| {
                let record = QueryRecord::new(id, timestamp, text);
                match file {
                    Some(file) => record.with_source_file(file),
                    None => record,
                }
            })
            .await
    }

    /// Probes the cache for a query that can answer `incoming`, the
    /// parsed form of `query_text`.
    ///
    /// An exact text match wins outright. Failing that, every cached
    /// query is parsed and tested for coverage of the incoming one; among
    /// several qualifying queries the most recently used is returned, so
    /// the probe is deterministic.
    pub async fn check_hit_or_miss(
        &self,
        query_text: &str,
        incoming: &Query,
    ) -> Result<Option<QueryRecord>> {
        let cached = self.inner.load_all().await?;
        if cached.is_empty() {
            return Ok(None);
        }

        if let Some(exact) = cached.iter().find(|record| record.query_text == query_text) {
            debug!(query_id = exact.id, "exact query text match");
            return Ok(Some(exact.clone()));
        }

        let mut best: Option<&QueryRecord> = None;
        for record in &cached {
            let stored = parse_query(&record.query_text).map_err(|e| {
                Error::storage(format!(
                    "cached query {} no longer parses: {e}",
                    record.id
                ))
            })?;
            if stored.covers(incoming) && best.map_or(true, |b| record.timestamp > b.timestamp) {
                best = Some(record);
            }
        }

        if let Some(found) = best {
            debug!(query_id = found.id, "cached query covers the incoming one");
        }
        Ok(best.cloned())
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
