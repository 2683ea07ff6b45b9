//! Core domain types and collaborator traits for the semantic query cache.

pub mod error;
pub mod record;
pub mod traits;

pub use error::{Error, Result};
pub use record::{CacheRecord, QueryRecord, ResultRecord};
pub use traits::{DocumentSource, DocumentStream, RecordPredicate, RecordStore, ResultStream};
