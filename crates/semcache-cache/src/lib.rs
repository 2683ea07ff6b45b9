//! Bounded persistent LRU caches backing the semantic query proxy.

pub mod heap;
pub mod persistent;
pub mod query_cache;
pub mod result_cache;

pub use heap::MinHeap;
pub use persistent::{BoundedCache, StoreOutcome};
pub use query_cache::QueryCache;
pub use result_cache::ResultCache;
