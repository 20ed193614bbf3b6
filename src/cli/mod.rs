/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{CacheAction, Cli, Commands, OutputFormat};
pub use commands::{handle_command, show_version};
