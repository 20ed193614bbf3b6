use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::constants::{
    CANCELLED_MESSAGE, DEFAULT_DRAFTS_DIR, DEFAULT_MAX_WORKERS, SKIPPED_MESSAGE,
};

/// Drafting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftingConfig {
    /// Size of the worker pool
    pub max_workers: usize,
    /// Skip items that already have a draft
    pub skip_existing: bool,
    /// Where drafted sections are written
    pub drafts_directory: PathBuf,
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            skip_existing: true,
            drafts_directory: PathBuf::from(DEFAULT_DRAFTS_DIR),
        }
    }
}

/// Something a draft can be produced for
///
/// The scheduler only needs a stable id; batching can also use a structural
/// depth when the item has one.
pub trait DraftItem: Send + Sync {
    fn id(&self) -> &str;

    /// Nesting depth in the outline, if known
    fn depth(&self) -> Option<u32> {
        None
    }
}

/// A paper section as seen by the drafting engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub depth: Option<u32>,
}

impl Section {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

impl DraftItem for Section {
    fn id(&self) -> &str {
        &self.id
    }

    fn depth(&self) -> Option<u32> {
        self.depth
    }
}

/// One unit of schedulable drafting work
#[derive(Debug, Clone)]
pub struct DraftTask<S> {
    pub item: S,
    /// Research notes or other material the draft is based on
    pub context: String,
    pub guidance: String,
    /// Higher runs earlier
    pub priority: i32,
}

impl<S: DraftItem> DraftTask<S> {
    pub fn new(item: S, context: impl Into<String>) -> Self {
        Self {
            item,
            context: context.into(),
            guidance: String::new(),
            priority: 0,
        }
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = guidance.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> &str {
        self.item.id()
    }
}

/// Lifecycle of a task inside one scheduling run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
    /// Filtered out before scheduling
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed | TaskState::Skipped)
    }
}

/// Terminal outcome of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftResult {
    pub id: String,
    pub state: TaskState,
    pub succeeded: bool,
    /// Present iff the task ran and succeeded
    pub output: Option<String>,
    /// Present iff the task failed or was skipped
    pub error_message: Option<String>,
    pub duration_seconds: f64,
}

impl DraftResult {
    pub fn success(id: impl Into<String>, output: String, duration_seconds: f64) -> Self {
        Self {
            id: id.into(),
            state: TaskState::Succeeded,
            succeeded: true,
            output: Some(output),
            error_message: None,
            duration_seconds,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            id: id.into(),
            state: TaskState::Failed,
            succeeded: false,
            output: None,
            error_message: Some(error.into()),
            duration_seconds,
        }
    }

    pub fn skipped(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: TaskState::Skipped,
            succeeded: true,
            output: None,
            error_message: Some(SKIPPED_MESSAGE.to_string()),
            duration_seconds: 0.0,
        }
    }

    pub fn cancelled(id: impl Into<String>) -> Self {
        Self::failure(id, CANCELLED_MESSAGE, 0.0)
    }

    pub fn is_skipped(&self) -> bool {
        self.state == TaskState::Skipped
    }
}

/// Aggregate view of a completed scheduling run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulingStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Summed over successful tasks only
    pub total_duration: f64,
    pub average_duration: f64,
    /// Percentage of all results that succeeded (skips excluded)
    pub success_rate: f64,
}

impl SchedulingStatistics {
    pub fn from_results(results: &HashMap<String, DraftResult>) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let mut stats = Self {
            total: results.len(),
            ..Default::default()
        };

        for result in results.values() {
            match result.state {
                TaskState::Skipped => stats.skipped += 1,
                TaskState::Succeeded => {
                    stats.successful += 1;
                    stats.total_duration += result.duration_seconds;
                }
                _ => stats.failed += 1,
            }
        }

        if stats.successful > 0 {
            stats.average_duration = stats.total_duration / stats.successful as f64;
        }
        stats.success_rate = stats.successful as f64 / stats.total as f64 * 100.0;
        stats
    }
}

/// Live counters for the run in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerProgress {
    /// Tasks handed to the pool (skips excluded)
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
}

impl SchedulerProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}
