use anyhow::Result;
use clap::Parser;

use papergen::{
    app::load_config,
    cli::{handle_command, Cli},
    utils::init_logger,
};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config.as_deref())?;

    // Set up logging
    init_logger(&config.logging.level, cli.verbose);

    handle_command(&cli.command, &config, cli.output_format)
}
