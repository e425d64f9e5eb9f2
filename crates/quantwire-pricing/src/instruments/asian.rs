//! Discrete-averaging Asian options.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quantwire_core::{Date, Observable, QuantResult, QuantwireError, Settings};

use crate::engine::{Arguments, ArgumentsKind};
use crate::instrument::{downcast_arguments, Instrument, InstrumentTerms};
use crate::instruments::payoff::PlainVanillaPayoff;

/// How the fixings are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageType {
    /// Arithmetic mean.
    #[default]
    Arithmetic,
    /// Geometric mean.
    Geometric,
}

impl fmt::Display for AverageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageType::Arithmetic => write!(f, "arithmetic"),
            AverageType::Geometric => write!(f, "geometric"),
        }
    }
}

/// Engine inputs for a discrete-averaging Asian option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsianOptionArguments {
    /// Averaging rule.
    pub average_type: AverageType,
    /// Sum (arithmetic) or product (geometric) of past fixings.
    pub running_accumulator: f64,
    /// Number of fixings already observed.
    pub past_fixings: usize,
    /// Sorted future and past fixing dates.
    pub fixing_dates: Vec<Date>,
    /// Payoff on the average.
    pub payoff: Option<PlainVanillaPayoff>,
    /// European exercise date.
    pub exercise_date: Option<Date>,
}

impl Arguments for AsianOptionArguments {
    fn kind(&self) -> ArgumentsKind {
        ArgumentsKind::AsianOption
    }

    fn validate(&self) -> QuantResult<()> {
        let payoff = self
            .payoff
            .ok_or_else(|| QuantwireError::invalid_input("no payoff given"))?;
        if self.exercise_date.is_none() {
            return Err(QuantwireError::invalid_input("no exercise given"));
        }
        if payoff.strike < 0.0 {
            return Err(QuantwireError::invalid_input(format!(
                "negative strike {} given",
                payoff.strike
            )));
        }
        if self.fixing_dates.is_empty() {
            return Err(QuantwireError::invalid_input("no fixing dates given"));
        }
        match self.average_type {
            AverageType::Arithmetic if self.running_accumulator < 0.0 => Err(
                QuantwireError::invalid_input("non negative running sum required"),
            ),
            AverageType::Geometric if self.running_accumulator <= 0.0 => Err(
                QuantwireError::invalid_input("positive running product required"),
            ),
            _ => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Terms of a European option on the discrete average of an underlying.
#[derive(Debug, Clone)]
pub struct DiscreteAveragingAsianOption {
    average_type: AverageType,
    running_accumulator: f64,
    past_fixings: usize,
    fixing_dates: Vec<Date>,
    payoff: PlainVanillaPayoff,
    exercise_date: Date,
    settings: Arc<Settings>,
}

/// An Asian option priced by an engine.
pub type AsianOption = Instrument<DiscreteAveragingAsianOption>;

impl DiscreteAveragingAsianOption {
    /// Creates the terms. Fixing dates are sorted.
    pub fn new(
        average_type: AverageType,
        running_accumulator: f64,
        past_fixings: usize,
        mut fixing_dates: Vec<Date>,
        payoff: PlainVanillaPayoff,
        exercise_date: Date,
        settings: Arc<Settings>,
    ) -> Self {
        fixing_dates.sort();
        Self {
            average_type,
            running_accumulator,
            past_fixings,
            fixing_dates,
            payoff,
            exercise_date,
            settings,
        }
    }

    /// Averaging rule.
    pub fn average_type(&self) -> AverageType {
        self.average_type
    }

    /// Sorted fixing dates.
    pub fn fixing_dates(&self) -> &[Date] {
        &self.fixing_dates
    }

    /// Payoff on the average.
    pub fn payoff(&self) -> PlainVanillaPayoff {
        self.payoff
    }

    /// Exercise date.
    pub fn exercise_date(&self) -> Date {
        self.exercise_date
    }
}

impl InstrumentTerms for DiscreteAveragingAsianOption {
    fn name(&self) -> String {
        format!(
            "AsianOption({} {} {})",
            self.average_type, self.payoff.option_type, self.payoff.strike
        )
    }

    fn dependencies(&self) -> Vec<&dyn Observable> {
        vec![self.settings.as_ref()]
    }

    fn arguments_kind(&self) -> ArgumentsKind {
        ArgumentsKind::AsianOption
    }

    fn is_expired(&self) -> QuantResult<bool> {
        Ok(self.exercise_date < self.settings.evaluation_date())
    }

    fn setup_arguments(&self, arguments: &mut dyn Arguments) -> QuantResult<()> {
        let name = self.name();
        let arguments: &mut AsianOptionArguments =
            downcast_arguments(&name, self.arguments_kind(), arguments)?;
        arguments.average_type = self.average_type;
        arguments.running_accumulator = self.running_accumulator;
        arguments.past_fixings = self.past_fixings;
        arguments.fixing_dates = self.fixing_dates.clone();
        arguments.payoff = Some(self.payoff);
        arguments.exercise_date = Some(self.exercise_date);
        Ok(())
    }
}
