use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::error::Result;
use crate::record::CacheRecord;

/// Lazy, finite, one-pass sequence of documents produced by a
/// [`DocumentSource`]. Not restartable.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Lazy sequence of serialized documents emitted by the caching proxy.
pub type ResultStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Predicate over a record's fields, used for find/delete operations.
pub type RecordPredicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Remote document-query collaborator.
///
/// Accepts a match stage plus an optional projection stage and streams the
/// matching documents back. Failures surface as [`Error::Source`] and are
/// not retried here; retry policy belongs to the implementation.
///
/// [`Error::Source`]: crate::Error::Source
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Runs the pipeline and returns the resulting document stream.
    async fn execute(&self, match_stage: &Value, projection: Option<&Value>)
        -> Result<DocumentStream>;
}

/// Persistent id-keyed record collection.
///
/// The storage engine behind it is opaque; the cache only relies on
/// insert, find, predicate-based find/delete, and counter reconstruction
/// via [`max_id`]/[`max_timestamp`].
///
/// [`max_id`]: RecordStore::max_id
/// [`max_timestamp`]: RecordStore::max_timestamp
#[async_trait]
pub trait RecordStore<T: CacheRecord>: Send + Sync {
    /// Persists a new record. Fails if the id is already present.
    async fn insert(&self, record: T) -> Result<()>;

    /// Replaces an existing record, matched by id.
    async fn update(&self, record: T) -> Result<()>;

    /// Returns every record in ascending id (persisted) order.
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Fetches a record by its identifier.
    async fn find_by_id(&self, id: u64) -> Result<Option<T>>;

    /// Returns the records matching the predicate, in persisted order.
    async fn find_where(&self, predicate: RecordPredicate<'_, T>) -> Result<Vec<T>>;

    /// Deletes a record by id, reporting whether one was removed.
    async fn delete_by_id(&self, id: u64) -> Result<bool>;

    /// Deletes every record matching the predicate, returning the count.
    async fn delete_where(&self, predicate: RecordPredicate<'_, T>) -> Result<usize>;

    /// Number of persisted records.
    async fn count(&self) -> Result<usize>;

    /// Largest persisted id, if any record exists.
    async fn max_id(&self) -> Result<Option<u64>>;

    /// Largest persisted timestamp, if any record exists.
    async fn max_timestamp(&self) -> Result<Option<u64>>;

    /// Removes every record.
    async fn clear(&self) -> Result<()>;
}
