/// Constants module to avoid magic numbers in the codebase

// Cache Configuration
pub const DEFAULT_CACHE_DIR: &str = ".papergen/cache";
pub const DEFAULT_TTL_HOURS: u64 = 24;
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;
pub const DEFAULT_KEEP_NEWEST: usize = 100;
pub const STATS_FILE_NAME: &str = "stats.json";

// Drafting Configuration
pub const DEFAULT_DRAFTS_DIR: &str = ".papergen/drafts";
pub const DEFAULT_MAX_WORKERS: usize = 3;
pub const DRAFT_FILE_EXTENSION: &str = "md";

// Result messages
pub const SKIPPED_MESSAGE: &str = "skipped (already exists)";
pub const CANCELLED_MESSAGE: &str = "cancelled";

// Speedup estimation
pub const ASSUMED_SECONDS_PER_SECTION: f64 = 60.0;
pub const PARALLEL_OVERHEAD_FACTOR: f64 = 1.1; // 10% scheduling overhead

// Project-local paths
pub const LOCAL_CONFIG_PATH: &str = ".papergen/config.toml";
pub const ENV_PREFIX: &str = "PAPERGEN_";
