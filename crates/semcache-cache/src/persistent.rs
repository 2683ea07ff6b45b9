//! Capacity-bounded persistent cache with LRU eviction.
//!
//! The cache pairs an id-keyed [`RecordStore`] with a min-heap ordered by
//! logical timestamp, so the heap root is always the least-recently-used
//! entry. Id and timestamp counters are monotonically increasing and are
//! reconstructed from the store's maxima on startup, so restarts never
//! reuse ids.

use std::sync::Arc;

use tracing::debug;

use semcache_core::{CacheRecord, Error, RecordPredicate, RecordStore, Result};

use crate::heap::MinHeap;

/// Heap entry mirroring a persisted record's ordering metadata.
/// Equality is by id alone: the id is the sole identity key, while the
/// timestamp is mutable ordering metadata.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeapEntry {
    pub id: u64,
    pub timestamp: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Outcome of a [`BoundedCache::store`]: the id assigned to the new item
/// and, when capacity forced one out, the evicted id. Reported together
/// so dependent caches can cascade deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    pub id: u64,
    pub evicted: Option<u64>,
}

/// Generic bounded cache over any [`CacheRecord`] kind.
pub struct BoundedCache<T: CacheRecord> {
    store: Arc<dyn RecordStore<T>>,
    heap: MinHeap<HeapEntry>,
    capacity: usize,
    next_id: u64,
    next_timestamp: u64,
}

fn lru_heap(entries: Vec<HeapEntry>) -> MinHeap<HeapEntry> {
    MinHeap::from_vec(entries, |parent: &HeapEntry, child: &HeapEntry| {
        parent.timestamp <= child.timestamp
    })
}

impl<T: CacheRecord> BoundedCache<T> {
    /// Opens the cache over an existing store, rebuilding the recency
    /// heap and re-seeding the id/timestamp counters from what survived.
    pub async fn open(store: Arc<dyn RecordStore<T>>, capacity: usize) -> Result<Self> {
        let records = store.find_all().await?;
        let entries: Vec<HeapEntry> = records
            .iter()
            .map(|record| HeapEntry {
                id: record.id(),
                timestamp: record.timestamp(),
            })
            .collect();
        let next_id = store.max_id().await?.unwrap_or(0);
        let next_timestamp = store.max_timestamp().await?.unwrap_or(0);

        debug!(records = entries.len(), capacity, "opened bounded cache");
        Ok(Self {
            store,
            heap: lru_heap(entries),
            capacity,
            next_id,
            next_timestamp,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn allocate_timestamp(&mut self) -> u64 {
        self.next_timestamp += 1;
        self.next_timestamp
    }

    /// Persists a new item built from a freshly allocated id and
    /// timestamp, evicting the least-recently-used entry first when the
    /// cache is full. A capacity of zero degenerates to "evict the item
    /// being stored immediately": nothing is persisted and the outcome
    /// reports the item's own id as evicted.
    pub async fn store(&mut self, build: impl FnOnce(u64, u64) -> T) -> Result<StoreOutcome> {
        let id = self.allocate_id();
        let timestamp = self.allocate_timestamp();
        let record = build(id, timestamp);

        if self.capacity == 0 {
            debug!(id, "cache capacity is zero; item evicted on store");
            return Ok(StoreOutcome {
                id,
                evicted: Some(id),
            });
        }

        let mut evicted = None;
        if self.heap.len() >= self.capacity {
            let lru = self.heap.extract();
            self.store.delete_by_id(lru.id).await?;
            debug!(evicted_id = lru.id, "evicted least-recently-used entry");
            evicted = Some(lru.id);
        }

        self.store.insert(record).await?;
        self.heap.insert(HeapEntry { id, timestamp });
        Ok(StoreOutcome { id, evicted })
    }

    /// Read-only projection over the persisted collection; does not
    /// affect recency.
    pub async fn load_all(&self) -> Result<Vec<T>> {
        self.store.find_all().await
    }

    pub async fn load_by_id(&self, id: u64) -> Result<Option<T>> {
        self.store.find_by_id(id).await
    }

    pub async fn load_where(&self, predicate: RecordPredicate<'_, T>) -> Result<Vec<T>> {
        self.store.find_where(predicate).await
    }

    /// Re-stamps the item with a fresh timestamp and repositions it in
    /// the heap. This is the sole recency-refresh mechanism.
    pub async fn update_access_time(&mut self, id: u64) -> Result<()> {
        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("cache item", id))?;
        let timestamp = self.allocate_timestamp();

        self.store.update(record.with_timestamp(timestamp)).await?;
        self.heap.update_node(
            &HeapEntry {
                id,
                timestamp: record.timestamp(),
            },
            HeapEntry { id, timestamp },
        );
        Ok(())
    }

    /// Bulk-deletes matching records and rebuilds the heap from the
    /// survivors. O(n), acceptable because cascading deletes are rare
    /// relative to reads and writes.
    pub async fn remove_where(&mut self, predicate: RecordPredicate<'_, T>) -> Result<usize> {
        let removed = self.store.delete_where(predicate).await?;
        if removed > 0 {
            let survivors = self.store.find_all().await?;
            let entries = survivors
                .iter()
                .map(|record| HeapEntry {
                    id: record.id(),
                    timestamp: record.timestamp(),
                })
                .collect();
            self.heap = lru_heap(entries);
        }
        Ok(removed)
    }

    /// Empties the persisted collection and the heap and resets both
    /// counters to zero.
    pub async fn clear(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.heap.clear();
        self.next_id = 0;
        self.next_timestamp = 0;
        Ok(())
    }
}
