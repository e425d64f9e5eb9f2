//! Repricing scenarios.
//!
//! A scenario describes a flat market (one rate quote, one volatility
//! quote, an evaluation date), a cap/floor/collar on a regular floating
//! leg, and a list of steps that move the market. Replaying it prices the
//! instrument after every step and records how many recalculations the
//! instrument performed so far.
//!
//! ```toml
//! name = "quarterly cap"
//! evaluation_date = "2025-01-02"
//! rate = 0.03
//! volatility = 0.20
//!
//! [instrument]
//! kind = "cap"
//! cap_rates = [0.04]
//! periods = 8
//!
//! [[steps]]
//! label = "rates up"
//! rate = 0.035
//!
//! [[steps]]
//! evaluation_date = "2025-07-02"
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabled::Tabled;

use quantwire_config::{Validate, ValidationError};
use quantwire_core::{Date, Handle, LazyOptions, Quote, Settings, SimpleQuote};
use quantwire_pricing::prelude::*;

use crate::error::{CliError, CliResult};
use crate::output::format_amount;

fn default_name() -> String {
    "scenario".to_string()
}

fn default_kind() -> CapFloorType {
    CapFloorType::Cap
}

fn default_nominal() -> f64 {
    1_000_000.0
}

fn default_tenor() -> u32 {
    3
}

/// Longest floating leg a scenario may describe, in months.
const MAX_LEG_MONTHS: u64 = 1200;

/// A scripted sequence of market moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Display name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Initial evaluation date.
    pub evaluation_date: Date,
    /// Initial flat continuously-compounded rate.
    pub rate: f64,
    /// Initial flat Black volatility.
    pub volatility: f64,
    /// The priced instrument.
    pub instrument: InstrumentSpec,
    /// Market moves, applied in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A cap, floor or collar on a regular floating leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentSpec {
    /// Cap, floor or collar.
    #[serde(default = "default_kind")]
    pub kind: CapFloorType,
    /// Cap strikes, padded with the last one.
    #[serde(default)]
    pub cap_rates: Vec<f64>,
    /// Floor strikes, padded with the last one.
    #[serde(default)]
    pub floor_rates: Vec<f64>,
    /// Coupon nominal.
    #[serde(default = "default_nominal")]
    pub nominal: f64,
    /// First accrual start; the evaluation date when omitted.
    #[serde(default)]
    pub start: Option<Date>,
    /// Months per coupon.
    #[serde(default = "default_tenor")]
    pub tenor_months: u32,
    /// Number of coupons.
    pub periods: u32,
}

/// One market move. Every field that is set is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// New evaluation date.
    #[serde(default)]
    pub evaluation_date: Option<Date>,
    /// New rate quote value.
    #[serde(default)]
    pub rate: Option<f64>,
    /// New volatility quote value.
    #[serde(default)]
    pub volatility: Option<f64>,
    /// Freeze (`true`) or unfreeze (`false`) the instrument.
    #[serde(default)]
    pub frozen: Option<bool>,
}

impl Step {
    fn is_empty(&self) -> bool {
        self.evaluation_date.is_none()
            && self.rate.is_none()
            && self.volatility.is_none()
            && self.frozen.is_none()
    }

    /// The label, or a description of the move.
    pub fn describe(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let mut parts = Vec::new();
        if let Some(date) = self.evaluation_date {
            parts.push(format!("date={date}"));
        }
        if let Some(rate) = self.rate {
            parts.push(format!("rate={rate}"));
        }
        if let Some(vol) = self.volatility {
            parts.push(format!("vol={vol}"));
        }
        match self.frozen {
            Some(true) => parts.push("freeze".to_string()),
            Some(false) => parts.push("unfreeze".to_string()),
            None => {}
        }
        parts.join(", ")
    }
}

impl Scenario {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> CliResult<Self> {
        let scenario: Self = toml::from_str(text).map_err(|e| CliError::Scenario(e.to_string()))?;
        scenario.validate_or_error()?;
        Ok(scenario)
    }

    /// Loads a scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> CliResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Validate for Scenario {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.volatility.is_nan() || self.volatility < 0.0 {
            errors.push(ValidationError::new("volatility", "must be non-negative"));
        }
        let spec = &self.instrument;
        if spec.periods == 0 {
            errors.push(ValidationError::new("instrument.periods", "must be positive"));
        }
        if spec.tenor_months == 0 {
            errors.push(ValidationError::new("instrument.tenor_months", "must be positive"));
        }
        if u64::from(spec.tenor_months) * u64::from(spec.periods) > MAX_LEG_MONTHS {
            errors.push(ValidationError::new(
                "instrument",
                format!("leg must span at most {MAX_LEG_MONTHS} months"),
            ));
        }
        if spec.nominal.is_nan() || spec.nominal <= 0.0 {
            errors.push(ValidationError::new("instrument.nominal", "must be positive"));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.is_empty() {
                errors.push(ValidationError::new(format!("steps[{i}]"), "moves nothing"));
            }
            if step.volatility.is_some_and(|v| v.is_nan() || v < 0.0) {
                errors.push(ValidationError::new(
                    format!("steps[{i}].volatility"),
                    "must be non-negative",
                ));
            }
        }
        errors
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// Pricing state after one step.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StepReport {
    /// Step index; 0 is the initial market.
    #[tabled(rename = "Step")]
    pub step: usize,
    /// What moved.
    #[tabled(rename = "Event")]
    pub event: String,
    /// Evaluation date after the step.
    #[tabled(rename = "Date")]
    pub evaluation_date: Date,
    /// Instrument NPV.
    #[tabled(rename = "NPV", display_with = "display_amount")]
    pub npv: f64,
    /// Recalculations performed so far.
    #[tabled(rename = "Recalcs")]
    pub recalculations: u64,
    /// Whether the instrument was frozen when priced.
    #[tabled(rename = "Frozen")]
    pub frozen: bool,
}

fn display_amount(value: &f64) -> String {
    format_amount(*value)
}

/// The live objects a scenario moves.
pub struct Market {
    settings: Arc<Settings>,
    rate: Arc<SimpleQuote>,
    volatility: Arc<SimpleQuote>,
    instrument: CapFloorInstrument,
}

impl Market {
    /// Wires quotes, curve, engine and instrument for a scenario.
    pub fn build(scenario: &Scenario, options: LazyOptions) -> CliResult<Self> {
        let settings = Arc::new(Settings::new(scenario.evaluation_date));
        let rate = Arc::new(SimpleQuote::new("rate", scenario.rate));
        let volatility = Arc::new(SimpleQuote::new("volatility", scenario.volatility));

        let rate_target: Arc<dyn Quote> = rate.clone();
        let curve: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::floating(
            settings.clone(),
            0,
            Handle::new(rate_target),
        ));
        let vol_target: Arc<dyn Quote> = volatility.clone();
        let engine = BlackCapFloorEngine::with_volatility(Handle::new(vol_target));

        let spec = &scenario.instrument;
        let start = spec.start.unwrap_or(scenario.evaluation_date);
        let span = u64::from(spec.tenor_months) * u64::from(spec.periods);
        if span > MAX_LEG_MONTHS {
            return Err(CliError::Scenario(format!(
                "leg spans {span} months, at most {MAX_LEG_MONTHS} allowed"
            )));
        }
        // Bounded by MAX_LEG_MONTHS above.
        let tenor = spec.tenor_months as i32;
        let leg = (0..spec.periods as i32)
            .map(|i| -> CliResult<FloatingRateCoupon> {
                Ok(FloatingRateCoupon::new(
                    start.add_months(tenor * i)?,
                    start.add_months(tenor * (i + 1))?,
                    spec.nominal,
                ))
            })
            .collect::<CliResult<Vec<_>>>()?;
        let terms = CapFloor::new(
            spec.kind,
            leg,
            spec.cap_rates.clone(),
            spec.floor_rates.clone(),
            Handle::new(curve),
        )?;

        Ok(Self {
            settings,
            rate,
            volatility,
            instrument: CapFloorInstrument::with_options(terms, Some(engine), options),
        })
    }

    /// Applies one market move.
    pub fn apply(&self, step: &Step) -> CliResult<()> {
        if let Some(date) = step.evaluation_date {
            self.settings.set_evaluation_date(date)?;
        }
        if let Some(rate) = step.rate {
            self.rate.set_value(rate)?;
        }
        if let Some(vol) = step.volatility {
            self.volatility.set_value(vol)?;
        }
        match step.frozen {
            Some(true) => self.instrument.freeze(),
            Some(false) => self.instrument.unfreeze()?,
            None => {}
        }
        Ok(())
    }

    fn report(&self, step: usize, event: String) -> CliResult<StepReport> {
        let npv = self.instrument.npv()?;
        Ok(StepReport {
            step,
            event,
            evaluation_date: self.settings.evaluation_date(),
            npv,
            recalculations: self.instrument.stats().recalculations,
            frozen: self.instrument.is_frozen(),
        })
    }
}

/// Replays a scenario, pricing after the initial setup and every step.
pub fn replay(scenario: &Scenario, options: LazyOptions) -> CliResult<Vec<StepReport>> {
    let market = Market::build(scenario, options)?;
    let mut reports = vec![market.report(0, "initial".to_string())?];

    for (i, step) in scenario.steps.iter().enumerate() {
        market.apply(step)?;
        let report = market.report(i + 1, step.describe())?;
        tracing::debug!(
            scenario = %scenario.name,
            step = report.step,
            npv = report.npv,
            recalculations = report.recalculations,
            "Step priced"
        );
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CAP: &str = r#"
        name = "quarterly cap"
        evaluation_date = "2025-01-02"
        rate = 0.03
        volatility = 0.20

        [instrument]
        cap_rates = [0.04]
        periods = 8

        [[steps]]
        label = "rates up"
        rate = 0.035

        [[steps]]
        rate = 0.035

        [[steps]]
        volatility = 0.25

        [[steps]]
        frozen = true
        rate = 0.05

        [[steps]]
        frozen = false
    "#;

    #[test]
    fn test_parse_defaults() {
        let scenario = Scenario::from_toml_str(CAP).unwrap();
        assert_eq!(scenario.instrument.kind, CapFloorType::Cap);
        assert_eq!(scenario.instrument.nominal, 1_000_000.0);
        assert_eq!(scenario.instrument.tenor_months, 3);
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(scenario.steps[0].describe(), "rates up");
        assert_eq!(scenario.steps[3].describe(), "rate=0.05, freeze");
    }

    #[test]
    fn test_invalid_scenarios() {
        let err = Scenario::from_toml_str("rate = 0.03").unwrap_err();
        assert!(matches!(err, CliError::Scenario(_)));

        let text = CAP.replace("periods = 8", "periods = 0");
        let err = Scenario::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("instrument.periods"));

        let text = CAP.replace("periods = 8", "periods = 2\ntenor_months = 2147483000");
        let err = Scenario::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("at most 1200 months"));

        let text = format!("{CAP}\n[[steps]]\nlabel = \"idle\"\n");
        let err = Scenario::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("moves nothing"));
    }

    #[test]
    fn test_replay_counts_recalculations() {
        let scenario = Scenario::from_toml_str(CAP).unwrap();
        let reports = replay(&scenario, LazyOptions::default()).unwrap();
        let recalcs: Vec<u64> = reports.iter().map(|r| r.recalculations).collect();

        // Same rate twice is no change; frozen steps serve the cached value.
        assert_eq!(recalcs, vec![1, 2, 2, 3, 3, 4]);
        assert!(reports[1].npv > reports[0].npv);
        assert_relative_eq!(reports[2].npv, reports[1].npv);
        assert!(reports[3].npv > reports[2].npv);
        assert_relative_eq!(reports[4].npv, reports[3].npv);
        assert!(reports[4].frozen);
        assert!(reports[5].npv > reports[4].npv);
    }

    #[test]
    fn test_rolling_past_maturity_expires() {
        let text = CAP.replace(
            "[[steps]]\n        label = \"rates up\"",
            "[[steps]]\n        evaluation_date = \"2027-06-01\"\n        label = \"rates up\"",
        );
        let scenario = Scenario::from_toml_str(&text).unwrap();
        let reports = replay(&scenario, LazyOptions::default()).unwrap();
        assert!(reports[0].npv > 0.0);
        assert_eq!(reports[1].npv, 0.0);
        assert_eq!(reports[1].evaluation_date, Date::from_ymd(2027, 6, 1).unwrap());
    }

    #[test]
    fn test_oversized_leg_is_rejected_by_build() {
        let mut scenario = Scenario::from_toml_str(CAP).unwrap();
        scenario.instrument.tenor_months = u32::MAX;
        let err = Market::build(&scenario, LazyOptions::default()).err().unwrap();
        assert!(matches!(err, CliError::Scenario(_)));
    }

    #[test]
    fn test_collar_needs_both_strikes() {
        let text = CAP.replace("cap_rates = [0.04]", "kind = \"collar\"\ncap_rates = [0.04]");
        let scenario = Scenario::from_toml_str(&text).unwrap();
        let err = replay(&scenario, LazyOptions::default()).err().unwrap();
        assert!(err.to_string().contains("no floor rates given"));
    }
}
