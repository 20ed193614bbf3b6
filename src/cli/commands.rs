use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::{
    app::{get_config_dir, init_config, Config},
    cache::ResponseCache,
    drafting::estimate_speedup,
};

use super::{CacheAction, Commands, OutputFormat};

/// Handle CLI subcommands
pub fn handle_command(command: &Commands, config: &Config, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Init => {
            let (path, created) = init_config(None)?;
            if created {
                println!("Created default configuration at: {}", path.display());
            } else {
                println!("Configuration already exists at: {}", path.display());
            }
            Ok(())
        }
        Commands::Cache { action } => handle_cache(*action, config, format),
        Commands::Estimate { sections, workers } => {
            let workers = workers.unwrap_or(config.drafting.max_workers);
            let estimate = estimate_speedup(*sections, workers);
            emit(format, &estimate, || estimate.format())
        }
        Commands::Status => show_status(config, format),
        Commands::Version => {
            show_version();
            Ok(())
        }
    }
}

fn handle_cache(action: CacheAction, config: &Config, format: OutputFormat) -> Result<()> {
    let cache = ResponseCache::new(&config.cache).context("Failed to open response cache")?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            emit(format, &stats, || stats.format())
        }
        CacheAction::Clear => {
            if !cache.is_enabled() {
                println!("{}", "Cache is disabled; nothing to clear".yellow());
                return Ok(());
            }
            let removed = cache.clear();
            println!("{} {} cache entries", "Cleared".green(), removed);
            Ok(())
        }
    }
}

/// Show version information
pub fn show_version() {
    println!("papergen v{}", env!("CARGO_PKG_VERSION"));
    println!("   Cached, parallel generation engine for paper drafting");
}

/// Show the effective configuration
fn show_status(config: &Config, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("papergen status:");
    println!();

    let cache_state = if config.cache.enabled {
        "[OK] enabled".green()
    } else {
        "[WARNING] disabled".yellow()
    };
    println!("  Cache: {} ({})", cache_state, config.cache.cache_directory.display());
    println!(
        "      TTL {}h, budget {} MB, keep newest {}, single-flight {}",
        config.cache.ttl_hours,
        config.cache.max_size_mb,
        config.cache.keep_newest,
        if config.cache.single_flight { "on" } else { "off" }
    );
    println!(
        "  Drafting: {} workers, skip existing: {} ({})",
        config.drafting.max_workers,
        config.drafting.skip_existing,
        config.drafting.drafts_directory.display()
    );

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("config.toml");
        if global.exists() {
            println!("  [OK] Global configuration: {}", global.display());
        } else {
            println!("  [WARNING] Global configuration: Not found (using defaults)");
        }
    }

    println!();
    Ok(())
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}
