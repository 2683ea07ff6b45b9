//! Cache record model.
//!
//! A cache record is anything with a stable identity and a logical recency
//! stamp. The `id` is the sole identity key and is never reused within a
//! session; the `timestamp` is mutable metadata used only for LRU ordering.
//! Records are immutable values: refreshing recency produces a rewritten
//! copy via [`CacheRecord::with_timestamp`] rather than mutating in place.

use serde::{Deserialize, Serialize};

/// Common surface of every cacheable record.
pub trait CacheRecord: Clone + Send + Sync + 'static {
    /// Cache-scoped identifier, monotonically assigned.
    fn id(&self) -> u64;

    /// Logical recency counter, strictly increasing per cache.
    fn timestamp(&self) -> u64;

    /// Returns a copy of this record carrying a fresh recency stamp.
    #[must_use]
    fn with_timestamp(&self, timestamp: u64) -> Self;
}

/// Cached query: the raw query text plus the file it originated from,
/// when one is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: u64,
    pub timestamp: u64,
    pub query_text: String,
    pub source_file: Option<String>,
}

impl QueryRecord {
    pub fn new(id: u64, timestamp: u64, query_text: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            query_text: query_text.into(),
            source_file: None,
        }
    }

    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }
}

impl CacheRecord for QueryRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn with_timestamp(&self, timestamp: u64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

/// Cached result document, tagged with the id of the query that fetched it
/// so a cascading delete can find every dependent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: u64,
    pub timestamp: u64,
    pub query_id: u64,
    pub document: String,
}

impl ResultRecord {
    pub fn new(id: u64, timestamp: u64, query_id: u64, document: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            query_id,
            document: document.into(),
        }
    }
}

impl CacheRecord for ResultRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn with_timestamp(&self, timestamp: u64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_timestamp_rewrites_without_touching_identity() {
        let record = QueryRecord::new(7, 1, "[]").with_source_file("q1.json");
        let refreshed = record.with_timestamp(9);

        assert_eq!(refreshed.id, 7);
        assert_eq!(refreshed.timestamp, 9);
        assert_eq!(refreshed.query_text, "[]");
        assert_eq!(refreshed.source_file.as_deref(), Some("q1.json"));
        // original is untouched
        assert_eq!(record.timestamp, 1);
    }

    #[test]
    fn result_record_round_trips_through_json() {
        let record = ResultRecord::new(3, 2, 1, r#"{"name":"beach house"}"#);
        let json = serde_json::to_string(&record).unwrap();
        let back: ResultRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
