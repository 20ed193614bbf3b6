use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::warn;

use super::types::CacheEntry;
use crate::constants::STATS_FILE_NAME;
use crate::utils::Result;

/// An entry file as seen by a directory scan
#[derive(Debug, Clone)]
pub struct EntryFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// File-level cache operations
///
/// One JSON document per fingerprint. Writes go through a temp file in the
/// same directory and are renamed into place, so a reader never observes a
/// half-written entry even when two workers race on the same key.
#[derive(Debug)]
pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    /// Create a new file cache
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        // Ensure cache directory exists
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Generate the cache key for a request
    ///
    /// SHA-256 over `model|temperature|system|prompt`, hex encoded. Empty
    /// strings are valid and distinct inputs.
    pub fn generate_key(prompt: &str, system_prompt: &str, model: &str, temperature: f64) -> String {
        let cache_input = format!("{}|{:?}|{}|{}", model, temperature, system_prompt, prompt);
        let mut hasher = Sha256::new();
        hasher.update(cache_input.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Path of the entry file for a key
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    pub fn stats_path(&self) -> PathBuf {
        self.cache_dir.join(STATS_FILE_NAME)
    }

    /// Load an entry; `Ok(None)` when no file exists for the key
    pub fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut entry: CacheEntry = serde_json::from_slice(&data)?;
        entry.key = key.to_string();
        Ok(Some(entry))
    }

    /// Save an entry, replacing whatever was stored under the key
    pub fn save(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.cache_dir)?;
        serde_json::to_writer_pretty(&mut tmp, entry)?;
        tmp.flush()?;
        tmp.persist(self.entry_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    /// Remove an entry; a missing file is not an error
    pub fn remove(&self, key: &str) -> Result<()> {
        remove_if_present(&self.entry_path(key)).map(|_| ())
    }

    /// Scan the directory for entry files (`*.json`, excluding `stats.json`)
    pub fn entries(&self) -> Result<Vec<EntryFile>> {
        let mut files = Vec::new();

        for dir_entry in fs::read_dir(&self.cache_dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();

            let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
            let is_stats = path.file_name().and_then(|n| n.to_str()) == Some(STATS_FILE_NAME);
            if !is_json || is_stats {
                continue;
            }

            // Entries can vanish between read_dir and stat when another worker evicts
            let metadata = match dir_entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            files.push(EntryFile {
                path,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        Ok(files)
    }

    /// Total size in bytes of all entry files
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.entries()?.iter().map(|f| f.size).sum())
    }

    /// Keep the `keep_newest` most recently modified entries, delete the rest
    ///
    /// Returns how many entries were actually deleted. Equal mtimes fall back
    /// to file name order.
    pub fn retain_newest(&self, keep_newest: usize) -> Result<usize> {
        let mut files = self.entries()?;
        if files.len() <= keep_newest {
            return Ok(0);
        }

        files.sort_by(|a, b| {
            Reverse(a.modified)
                .cmp(&Reverse(b.modified))
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut removed = 0;
        for file in &files[keep_newest..] {
            match remove_if_present(&file.path) {
                Ok(true) => removed += 1,
                // Already deleted by a concurrent cleanup
                Ok(false) => {}
                Err(e) => warn!("Error deleting cache file {}: {}", file.path.display(), e),
            }
        }

        Ok(removed)
    }

    /// Delete every entry file, leaving `stats.json` for the caller to rewrite
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for file in self.entries()? {
            match remove_if_present(&file.path) {
                Ok(true) => removed += 1,
                // Already deleted by a concurrent cleanup
                Ok(false) => {}
                Err(e) => warn!("Error deleting cache file {}: {}", file.path.display(), e),
            }
        }
        Ok(removed)
    }
}

/// `Ok(true)` only when this call deleted the file
fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
