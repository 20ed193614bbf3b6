pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod drafting;
pub mod generation;
pub mod utils;

pub use app::{load_config, Config};
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use drafting::{DraftResult, DraftScheduler, DraftTask, DraftWorker, SchedulingStatistics};
pub use generation::{CachedGenerator, Generation, GenerationRequest, Generator};
pub use utils::PaperGenError;
