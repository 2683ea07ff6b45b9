//! Record store backends for the bounded caches.

pub mod file;
pub mod memory;

pub use file::JsonFileRecordStore;
pub use memory::MemoryRecordStore;
