//! Quantwire configuration layer.
//!
//! - **Framework configuration**: lazy-object defaults and logging setup,
//!   read from TOML or JSON ([`FrameworkConfig`])
//! - **Validation**: the [`Validate`] trait with field-level errors
//! - **Telemetry**: [`init_tracing`] installs the `tracing` subscriber
//!
//! # Example
//!
//! ```rust
//! use quantwire_config::{FrameworkConfig, LogFormat};
//! use quantwire_core::ForwardPolicy;
//!
//! let config = FrameworkConfig::from_toml_str(
//!     r#"
//!     [lazy]
//!     forward_policy = "first_invalidation"
//!
//!     [logging]
//!     format = "json"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.lazy.forward_policy, ForwardPolicy::FirstInvalidation);
//! assert_eq!(config.logging.format, LogFormat::Json);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod framework;
pub mod telemetry;

pub use error::{ConfigError, ConfigResult, Validate, ValidationError};
pub use framework::{FrameworkConfig, LogFormat, LoggingConfig};
pub use telemetry::{env_filter, init_tracing};
