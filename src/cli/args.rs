use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "papergen")]
#[command(version)]
#[command(about = "Cached, parallel generation engine for paper drafting", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default project configuration
    Init,
    /// Inspect or reset the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Estimate the speedup of parallel drafting
    Estimate {
        /// Number of sections to draft
        #[arg(short, long)]
        sections: usize,

        /// Worker pool size (defaults to the configured max_workers)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Show the effective configuration
    Status,
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Print hit/miss counters and on-disk footprint
    Stats,
    /// Delete every entry and reset the counters
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}
