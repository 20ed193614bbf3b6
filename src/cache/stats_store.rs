use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

use super::types::CacheCounters;
use crate::utils::Result;

/// Load persisted counters
///
/// A missing or unreadable `stats.json` starts the counters from zero.
pub fn load_counters(path: &Path) -> CacheCounters {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return CacheCounters::default(),
        Err(e) => {
            warn!("Error loading cache stats from {}: {}", path.display(), e);
            return CacheCounters::default();
        }
    };

    serde_json::from_slice(&data).unwrap_or_else(|e| {
        warn!("Ignoring corrupt cache stats in {}: {}", path.display(), e);
        CacheCounters::default()
    })
}

/// Persist counters next to the entries
pub fn save_counters(path: &Path, counters: &CacheCounters) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, counters)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
