//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

use quantwire_config::ConfigError;
use quantwire_core::QuantwireError;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Scenario file could not be read.
    #[error("Cannot read scenario {}: {source}", path.display())]
    Io {
        /// Scenario path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Scenario text is malformed.
    #[error("Invalid scenario: {0}")]
    Scenario(String),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pricing error.
    #[error("Pricing error: {0}")]
    Pricing(#[from] QuantwireError),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
