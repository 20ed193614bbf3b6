use anyhow::Result;

use super::types::{DraftItem, DraftTask};

/// The work function the scheduler runs for each task
pub trait DraftWorker<S: DraftItem>: Send + Sync {
    /// Produce the draft text for one task
    fn draft(&self, task: &DraftTask<S>) -> Result<String>;

    /// Whether a draft for `id` already exists; consulted only when skipping existing drafts
    fn already_drafted(&self, _id: &str) -> bool {
        false
    }
}
