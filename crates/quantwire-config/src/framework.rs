//! Framework configuration.
//!
//! A [`FrameworkConfig`] collects the defaults applied when building lazy
//! objects and the logging setup. It is read from TOML or JSON; every field
//! is optional.
//!
//! ```toml
//! [lazy]
//! forward_policy = "first_invalidation"
//! notify_on_recalculate = false
//!
//! [logging]
//! filter = "quantwire_core=debug,info"
//! format = "compact"
//! ansi = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use quantwire_core::LazyOptions;

use crate::error::{ConfigError, ConfigResult, Validate, ValidationError};

// =============================================================================
// LOGGING
// =============================================================================

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Output layout.
    pub format: LogFormat,
    /// Emit ANSI colours.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Sets the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sets the output layout.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.filter.trim().is_empty() {
            errors.push(ValidationError::new("logging.filter", "must not be empty"));
        } else if let Err(e) = EnvFilter::try_new(&self.filter) {
            errors.push(ValidationError::new("logging.filter", e.to_string()));
        }
        errors
    }
}

// =============================================================================
// FRAMEWORK
// =============================================================================

/// Top-level framework configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Defaults for lazy objects.
    pub lazy: LazyOptions,
    /// Logging setup.
    pub logging: LoggingConfig,
}

impl FrameworkConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate_or_error()?;
        Ok(config)
    }

    /// Parses and validates JSON text.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate_or_error()?;
        Ok(config)
    }

    /// Loads a file, choosing the format from its extension.
    ///
    /// `.json` files are parsed as JSON, everything else as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };

        tracing::debug!(path = %path.display(), "Loaded framework configuration");
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            format: "toml",
            message: e.to_string(),
        })
    }

    /// Renders the configuration as pretty JSON.
    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Validate for FrameworkConfig {
    fn validate(&self) -> Vec<ValidationError> {
        self.logging.validate()
    }
}
