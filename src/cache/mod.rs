// Gateway module for cache - follows the Train Station Pattern
// All external access must go through this gateway

mod file_cache;
mod response_cache;
mod stats_store;
mod types;

pub use file_cache::{EntryFile, FileCache};
pub use response_cache::ResponseCache;
pub use types::{CacheConfig, CacheCounters, CacheEntry, CacheStats};

/// Open the response cache described by `config`
pub fn init(config: &CacheConfig) -> crate::utils::Result<ResponseCache> {
    ResponseCache::new(config)
}
