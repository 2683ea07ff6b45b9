use serde::{Deserialize, Serialize};

/// Proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Maximum number of cached query texts.
    pub query_capacity: usize,

    /// Maximum number of cached result documents.
    pub result_capacity: usize,

    /// Empty both caches when the proxy starts. Turning this off keeps
    /// cache contents across restarts; ids then continue from the
    /// persisted maximum and are never reused.
    pub clear_on_start: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            query_capacity: 64,
            result_capacity: 8192,
            clear_on_start: true,
        }
    }
}
