use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_KEEP_NEWEST, DEFAULT_MAX_SIZE_MB, DEFAULT_TTL_HOURS,
};

/// Response cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `<fingerprint>.json` entries and `stats.json`
    pub cache_directory: PathBuf,
    /// Entries older than this are treated as absent
    pub ttl_hours: u64,
    /// On-disk budget that triggers a cleanup pass
    pub max_size_mb: u64,
    /// Whether caching is enabled at all
    pub enabled: bool,
    /// Number of most recently modified entries kept by a cleanup pass
    pub keep_newest: usize,
    /// Share one in-flight generation between concurrent callers of the same fingerprint
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: PathBuf::from(DEFAULT_CACHE_DIR),
            ttl_hours: DEFAULT_TTL_HOURS,
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            enabled: true,
            keep_newest: DEFAULT_KEEP_NEWEST,
            single_flight: false,
        }
    }
}

/// One cached generation result, stored as `<key>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint of the request; carried by the file name, not the body
    #[serde(skip)]
    pub key: String,
    /// Creation time in seconds since the epoch
    pub timestamp: f64,
    pub response: String,
    pub model: String,
    pub temperature: f64,
    #[serde(rename = "tokens", default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub prompt_length: usize,
    #[serde(default)]
    pub response_length: usize,
}

impl CacheEntry {
    /// Age of the entry relative to `now` (seconds since the epoch)
    pub fn age_seconds(&self, now: f64) -> f64 {
        now - self.timestamp
    }

    /// An entry is usable iff its age does not exceed the TTL
    pub fn is_fresh(&self, now: f64, ttl_seconds: f64) -> bool {
        self.age_seconds(now) <= ttl_seconds
    }
}

/// Durable cache counters, persisted as `stats.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub saves: u64,
    pub evictions: u64,
    pub total_tokens_saved: u64,
}

impl CacheCounters {
    pub fn total_lookups(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }

    // Counters saturate; a bogus token count must not fail a lookup

    pub fn record_hit(&mut self, tokens_saved: u64) {
        self.hits = self.hits.saturating_add(1);
        self.total_tokens_saved = self.total_tokens_saved.saturating_add(tokens_saved);
    }

    pub fn record_miss(&mut self) {
        self.misses = self.misses.saturating_add(1);
    }

    pub fn record_save(&mut self) {
        self.saves = self.saves.saturating_add(1);
    }

    pub fn record_evictions(&mut self, removed: usize) {
        self.evictions = self.evictions.saturating_add(removed as u64);
    }

    /// Fraction of lookups that hit, 0 when nothing has been looked up yet
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Point-in-time view of the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub saves: u64,
    pub evictions: u64,
    pub total_requests: u64,
    /// hits / (hits + misses), in `[0, 1]`
    pub hit_rate: f64,
    pub tokens_saved: u64,
    pub cache_entries: usize,
    pub cache_size_bytes: u64,
    pub ttl_hours: u64,
    pub cache_directory: PathBuf,
}

impl CacheStats {
    pub(crate) fn from_counters(
        counters: &CacheCounters,
        enabled: bool,
        cache_entries: usize,
        cache_size_bytes: u64,
        ttl_hours: u64,
        cache_directory: PathBuf,
    ) -> Self {
        Self {
            enabled,
            hits: counters.hits,
            misses: counters.misses,
            saves: counters.saves,
            evictions: counters.evictions,
            total_requests: counters.total_lookups(),
            hit_rate: counters.hit_rate(),
            tokens_saved: counters.total_tokens_saved,
            cache_entries,
            cache_size_bytes,
            ttl_hours,
            cache_directory,
        }
    }

    /// Format cache stats for display
    pub fn format(&self) -> String {
        format!(
            "Cache Statistics:\n\
            Directory: {}\n\
            Enabled: {}\n\
            Entries: {} ({:.2} MB)\n\
            TTL: {}h\n\
            Hit Rate: {:.1}% ({} hits, {} misses)\n\
            Saves: {}, Evictions: {}\n\
            Tokens Saved: {}",
            self.cache_directory.display(),
            self.enabled,
            self.cache_entries,
            self.cache_size_bytes as f64 / 1_048_576.0,
            self.ttl_hours,
            self.hit_rate * 100.0,
            self.hits,
            self.misses,
            self.saves,
            self.evictions,
            self.tokens_saved
        )
    }
}
