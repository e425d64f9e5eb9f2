//! Tracing subscriber installation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ConfigError, ConfigResult, Validate};
use crate::framework::{LogFormat, LoggingConfig};

/// Builds the filter: `RUST_LOG` if set, the configured directives otherwise.
pub fn env_filter(config: &LoggingConfig) -> ConfigResult<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| ConfigError::Validation {
                field: EnvFilter::DEFAULT_ENV.to_string(),
                message: e.to_string(),
            }),
        _ => {
            config.validate_or_error()?;
            EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::Validation {
                field: "logging.filter".to_string(),
                message: e.to_string(),
            })
        }
    }
}

/// Installs the global tracing subscriber, writing to stderr.
///
/// # Errors
///
/// Fails on an invalid filter or if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).pretty().with_ansi(config.ansi))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().with_writer(std::io::stderr).compact().with_ansi(config.ansi))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init(),
    };
    installed.map_err(|e| ConfigError::TracingInit(e.to_string()))?;

    tracing::debug!(format = ?config.format, "Tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_from_config() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let config = LoggingConfig::default().with_filter("quantwire_core=debug,warn");
        let filter = env_filter(&config).unwrap();
        assert!(filter.to_string().contains("quantwire_core=debug"));

        let empty = LoggingConfig::default().with_filter("");
        assert!(env_filter(&empty).is_err());
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default().with_format(LogFormat::Json);
        let _ = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(matches!(second, Err(ConfigError::TracingInit(_))));
    }
}
