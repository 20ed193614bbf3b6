// Gateway module for drafting - follows the Train Station Pattern
// All external access must go through this gateway

mod batching;
mod drafter;
mod estimate;
mod scheduler;
mod store;
mod types;
mod worker;

pub use batching::{batch_by_depth, batch_by_priority, batch_by_size};
pub use drafter::GeneratingDrafter;
pub use estimate::{estimate_speedup, SpeedupEstimate};
pub use scheduler::{CancellationToken, DraftScheduler, ProgressCallback};
pub use store::DraftStore;
pub use types::{
    DraftItem, DraftResult, DraftTask, DraftingConfig, SchedulerProgress, SchedulingStatistics,
    Section, TaskState,
};
pub use worker::DraftWorker;
