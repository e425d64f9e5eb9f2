//! Quantwire CLI - drive repricing scenarios through the notification graph.
//!
//! # Usage
//!
//! ```bash
//! # Replay a scenario and show NPV and recalculation counts per step
//! quantwire run scenario.toml
//!
//! # Same, as JSON, with lazy-object defaults from a framework file
//! quantwire run scenario.toml --format json --config framework.toml
//!
//! # Inspect or check a framework configuration
//! quantwire config show framework.toml
//! quantwire config validate framework.toml
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod error;
mod output;
mod scenario;

use cli::{Cli, Commands};
use quantwire_config::{init_tracing, FrameworkConfig, LoggingConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format;

    // Logging follows the framework file when one is given.
    let framework = match &cli.framework {
        Some(path) => Some(FrameworkConfig::from_file(path)?),
        None => None,
    };
    let logging = framework
        .as_ref()
        .map(|f| f.logging.clone())
        .unwrap_or_else(|| LoggingConfig::default().with_filter("warn"));
    init_tracing(&logging)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, framework.as_ref(), format)?,
        Commands::Config(args) => commands::config::execute(args, framework.as_ref(), format)?,
    }

    Ok(())
}
