use chrono::Utc;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::file_cache::FileCache;
use super::stats_store::{load_counters, save_counters};
use super::types::{CacheConfig, CacheCounters, CacheEntry, CacheStats};
use crate::utils::{PaperGenError, Result};

/// Disk-backed response cache with TTL and size-bounded cleanup
///
/// Cache failures never reach the caller once the cache is constructed: a
/// read error is a miss, a write error is a skipped save. Counters live
/// behind a mutex so one instance can be shared across worker threads; the
/// entry files themselves are not locked.
#[derive(Debug)]
pub struct ResponseCache {
    /// `None` when caching is disabled
    files: Option<FileCache>,
    counters: Mutex<CacheCounters>,
    cache_dir: PathBuf,
    ttl_hours: u64,
    ttl_seconds: f64,
    max_size_bytes: u64,
    keep_newest: usize,
}

impl ResponseCache {
    /// Open (or create) the cache described by `config`
    ///
    /// Invalid settings are rejected here rather than producing a cache with
    /// undefined expiry or eviction behavior.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        if config.ttl_hours == 0 {
            return Err(PaperGenError::Config("ttl_hours must be at least 1".to_string()));
        }
        if config.max_size_mb == 0 {
            return Err(PaperGenError::Config("max_size_mb must be at least 1".to_string()));
        }
        if config.keep_newest == 0 {
            return Err(PaperGenError::Config("keep_newest must be at least 1".to_string()));
        }

        let ttl_seconds = config.ttl_hours.checked_mul(3600).ok_or_else(|| {
            PaperGenError::Config(format!("ttl_hours is too large: {}", config.ttl_hours))
        })?;
        let max_size_bytes = config.max_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            PaperGenError::Config(format!("max_size_mb is too large: {}", config.max_size_mb))
        })?;

        let (files, counters) = if config.enabled {
            let files = FileCache::new(config.cache_directory.clone())?;
            let counters = load_counters(&files.stats_path());
            info!(
                "Response cache initialized: {} (TTL: {}h)",
                config.cache_directory.display(),
                config.ttl_hours
            );
            (Some(files), counters)
        } else {
            debug!("Response cache disabled");
            (None, CacheCounters::default())
        };

        Ok(Self {
            files,
            counters: Mutex::new(counters),
            cache_dir: config.cache_directory.clone(),
            ttl_hours: config.ttl_hours,
            ttl_seconds: ttl_seconds as f64,
            max_size_bytes,
            keep_newest: config.keep_newest,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.files.is_some()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Look up a cached response
    ///
    /// Expired entries are deleted on the way out and count as misses.
    pub fn get(&self, prompt: &str, system_prompt: &str, model: &str, temperature: f64) -> Option<String> {
        let files = self.files.as_ref()?;
        let key = FileCache::generate_key(prompt, system_prompt, model, temperature);

        let entry = match files.load(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.counters.lock().record_miss();
                return None;
            }
            Err(e) => {
                warn!("Error reading cache entry {}: {}", short_key(&key), e);
                self.counters.lock().record_miss();
                return None;
            }
        };

        let now = now_seconds();
        if !entry.is_fresh(now, self.ttl_seconds) {
            if let Err(e) = files.remove(&key) {
                warn!("Error deleting expired cache entry {}: {}", short_key(&key), e);
            }
            self.counters.lock().record_miss();
            debug!(
                "Cache expired: {}... (age: {:.1}h)",
                short_key(&key),
                entry.age_seconds(now) / 3600.0
            );
            return None;
        }

        {
            self.counters.lock().record_hit(entry.tokens_used);
        }

        info!(
            "Cache HIT: {}... (age: {:.1}h, tokens saved: {})",
            short_key(&key),
            entry.age_seconds(now) / 3600.0,
            entry.tokens_used
        );

        Some(entry.response)
    }

    /// Store a response, overwriting any previous entry for the same request
    pub fn set(
        &self,
        prompt: &str,
        system_prompt: &str,
        model: &str,
        temperature: f64,
        response: &str,
        tokens_used: u64,
    ) {
        let Some(files) = self.files.as_ref() else {
            return;
        };
        let key = FileCache::generate_key(prompt, system_prompt, model, temperature);

        let entry = CacheEntry {
            key: key.clone(),
            timestamp: now_seconds(),
            response: response.to_string(),
            model: model.to_string(),
            temperature,
            tokens_used,
            prompt_length: prompt.chars().count(),
            response_length: response.chars().count(),
        };

        if let Err(e) = files.save(&key, &entry) {
            warn!("Error writing cache entry {}: {}", short_key(&key), e);
            return;
        }

        self.counters.lock().record_save();
        debug!("Cache SAVE: {}... (tokens: {})", short_key(&key), tokens_used);

        self.cleanup_if_needed(files);
    }

    /// Run a keep-newest cleanup pass when the store is over budget
    fn cleanup_if_needed(&self, files: &FileCache) {
        let total_size = match files.total_size() {
            Ok(size) => size,
            Err(e) => {
                warn!("Error measuring cache size: {}", e);
                return;
            }
        };

        if total_size <= self.max_size_bytes {
            return;
        }

        info!(
            "Cache size exceeded ({:.1}MB), cleaning up...",
            total_size as f64 / 1_048_576.0
        );

        match files.retain_newest(self.keep_newest) {
            Ok(0) => {}
            Ok(removed) => {
                self.counters.lock().record_evictions(removed);
                info!("Cleaned up {} old cache entries", removed);
            }
            Err(e) => warn!("Error cleaning up cache: {}", e),
        }
    }

    /// Remove all entries and reset the counters
    ///
    /// Returns the number of entries deleted.
    pub fn clear(&self) -> usize {
        let Some(files) = self.files.as_ref() else {
            return 0;
        };

        let removed = files.clear().unwrap_or_else(|e| {
            warn!("Error clearing cache: {}", e);
            0
        });
        info!("Cleared {} cache entries", removed);

        *self.counters.lock() = CacheCounters::default();
        self.flush_stats();
        removed
    }

    /// Snapshot of the counters plus the current on-disk footprint
    pub fn stats(&self) -> CacheStats {
        let (entries, size) = match self.files.as_ref() {
            Some(files) => match files.entries() {
                Ok(entries) => (entries.len(), entries.iter().map(|f| f.size).sum()),
                Err(e) => {
                    warn!("Error scanning cache directory: {}", e);
                    (0, 0)
                }
            },
            None => (0, 0),
        };

        let counters = self.counters.lock().clone();
        CacheStats::from_counters(
            &counters,
            self.is_enabled(),
            entries,
            size,
            self.ttl_hours,
            self.cache_dir.clone(),
        )
    }

    /// Current counters without touching the disk
    pub fn counters(&self) -> CacheCounters {
        self.counters.lock().clone()
    }

    /// Persist the counters to `stats.json`
    pub fn flush_stats(&self) {
        let Some(files) = self.files.as_ref() else {
            return;
        };

        let counters = self.counters.lock().clone();
        if let Err(e) = save_counters(&files.stats_path(), &counters) {
            warn!("Error saving cache stats: {}", e);
        }
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        self.flush_stats();
    }
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn short_key(key: &str) -> &str {
    &key[..key.len().min(8)]
}
