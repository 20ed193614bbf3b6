use anyhow::{bail, Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants::DRAFT_FILE_EXTENSION;

/// Section drafts on disk, one `<id>.md` per section
#[derive(Debug, Clone)]
pub struct DraftStore {
    dir: PathBuf,
}

impl DraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create drafts directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a draft, keeping the previous version as `<id>.md.bak`
    pub fn save(&self, id: &str, content: &str) -> Result<PathBuf> {
        let path = self.draft_path(id)?;

        if path.exists() {
            let backup_path = path.with_extension(format!("{}.bak", DRAFT_FILE_EXTENSION));
            fs::copy(&path, &backup_path)
                .with_context(|| format!("Failed to back up draft: {}", path.display()))?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write draft: {}", path.display()))?;
        Ok(path)
    }

    /// Load a draft; `None` if it was never written
    pub fn load(&self, id: &str) -> Result<Option<String>> {
        let path = self.draft_path(id)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read draft: {}", path.display())),
        }
    }

    /// Whether a non-empty draft exists for `id`
    pub fn exists(&self, id: &str) -> bool {
        matches!(self.load(id), Ok(Some(content)) if !content.trim().is_empty())
    }

    /// Ids of all drafts, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list drafts in: {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DRAFT_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn draft_path(&self, id: &str) -> Result<PathBuf> {
        // Ids become file names; refuse anything that could leave the directory
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            bail!("Invalid section id for a draft file: {:?}", id);
        }
        Ok(self.dir.join(format!("{}.{}", id, DRAFT_FILE_EXTENSION)))
    }
}
