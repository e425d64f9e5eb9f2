//! Run command implementation.
//!
//! Replays a scenario file and reports NPV and recalculation counts per step.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use quantwire_config::FrameworkConfig;

use crate::cli::OutputFormat;
use crate::output::{format_percent, print_header, print_output};
use crate::scenario::{replay, Scenario};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,
}

/// Execute the run command.
pub fn execute(
    args: RunArgs,
    framework: Option<&FrameworkConfig>,
    format: OutputFormat,
) -> Result<()> {
    let scenario = Scenario::from_file(&args.scenario)?;
    let options = framework.map(|f| f.lazy).unwrap_or_default();
    tracing::info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        forward_policy = ?options.forward_policy,
        "Replaying scenario"
    );

    let reports = replay(&scenario, options)?;

    if format == OutputFormat::Table {
        print_header(&format!(
            "{}: {} from {}, rate {}, vol {}",
            scenario.name,
            scenario.instrument.kind,
            scenario.evaluation_date,
            format_percent(scenario.rate),
            format_percent(scenario.volatility),
        ));
    }
    print_output(&reports, format)
}
