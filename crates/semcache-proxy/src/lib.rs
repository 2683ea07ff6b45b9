//! Caching proxy tying the parser, the coverage check, and the bounded
//! caches together in front of a remote document source.

pub mod config;
pub mod proxy;
pub mod source;

pub use config::ProxyConfig;
pub use proxy::CachingProxy;
pub use source::MemoryDocumentSource;
