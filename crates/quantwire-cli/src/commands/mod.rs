//! CLI command implementations.

pub mod config;
pub mod run;

pub use config::ConfigArgs;
pub use run::RunArgs;
