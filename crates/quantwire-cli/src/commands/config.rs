//! Config command implementation.
//!
//! Shows and validates framework configuration files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use quantwire_config::{ConfigError, FrameworkConfig};

use crate::cli::OutputFormat;
use crate::output::{print_error, print_header, print_output, print_success};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration (defaults when no file is given)
    Show(ShowArgs),

    /// Check a configuration file
    Validate(ValidateArgs),
}

/// Arguments for show subcommand.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Configuration file; falls back to --config
    pub file: Option<PathBuf>,
}

/// Arguments for validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file
    pub file: PathBuf,
}

/// A configuration setting for display.
#[derive(Debug, Serialize, Tabled)]
struct Setting {
    #[tabled(rename = "Setting")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl Setting {
    fn new(key: &'static str, value: impl ToString) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Execute the config command.
pub fn execute(
    args: ConfigArgs,
    framework: Option<&FrameworkConfig>,
    format: OutputFormat,
) -> Result<()> {
    match args.command {
        ConfigCommand::Show(show) => {
            let config = match (&show.file, framework) {
                (Some(path), _) => FrameworkConfig::from_file(path)?,
                (None, Some(config)) => config.clone(),
                (None, None) => FrameworkConfig::default(),
            };
            show_config(&config, format)
        }
        ConfigCommand::Validate(validate) => validate_file(&validate.file),
    }
}

fn show_config(config: &FrameworkConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", config.to_json_string()?);
            Ok(())
        }
        OutputFormat::Table => {
            print_header("Framework configuration");
            let rows = vec![
                Setting::new("lazy.forward_policy", format!("{:?}", config.lazy.forward_policy)),
                Setting::new("lazy.notify_on_recalculate", config.lazy.notify_on_recalculate),
                Setting::new("logging.filter", &config.logging.filter),
                Setting::new("logging.format", format!("{:?}", config.logging.format)),
                Setting::new("logging.ansi", config.logging.ansi),
            ];
            print_output(&rows, format)
        }
    }
}

fn validate_file(path: &Path) -> Result<()> {
    match FrameworkConfig::from_file(path) {
        Ok(_) => {
            print_success(&format!("{} is valid", path.display()));
            Ok(())
        }
        Err(ConfigError::MultipleValidationErrors(errors)) => {
            for error in &errors {
                print_error(&error.to_string());
            }
            bail!("{} has {} validation errors", path.display(), errors.len())
        }
        Err(e) => {
            print_error(&e.to_string());
            bail!("{} is invalid", path.display())
        }
    }
}
