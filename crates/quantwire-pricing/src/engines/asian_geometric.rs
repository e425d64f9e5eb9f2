//! Closed-form engine for discrete geometric average-price Asian options.
//!
//! The log of a discrete geometric average of lognormal fixings is normal.
//! With `n` total fixings, `p` of them past, future fixing times `t_i` and
//! running log-product `L`:
//!
//! ```text
//! mu_G    = p/n * L + (n-p)/n * ln S + nu * sum(t_i) / n
//! var_G   = sigma^2 / n^2 * (sum(t_i) + 2 * sum_{i<j} t_i)
//! F_G     = exp(mu_G + var_G / 2)
//! value   = Black(payoff, F_G, sqrt(var_G), D(T))
//! ```
//!
//! where `nu = r - q - sigma^2 / 2` with zero rates to the exercise date.

use std::sync::Arc;

use quantwire_core::{Date, Observable, QuantResult, QuantwireError};

use crate::engine::{EngineCalculator, EngineResults, GenericEngine};
use crate::instruments::asian::{AsianOptionArguments, AverageType};
use crate::math::black_formula;
use crate::process::BlackScholesProcess;

/// Pricing step of [`AnalyticDiscreteGeometricAsianEngine`].
#[derive(Debug)]
pub struct DiscreteGeometricAsianCalculator {
    process: Arc<BlackScholesProcess>,
}

/// Analytic engine for discrete geometric average-price Asian options.
pub type AnalyticDiscreteGeometricAsianEngine = GenericEngine<DiscreteGeometricAsianCalculator>;

impl AnalyticDiscreteGeometricAsianEngine {
    /// Creates an engine on a Black-Scholes process.
    pub fn with_process(process: Arc<BlackScholesProcess>) -> Arc<Self> {
        GenericEngine::new(DiscreteGeometricAsianCalculator { process })
    }
}

impl EngineCalculator for DiscreteGeometricAsianCalculator {
    type Arguments = AsianOptionArguments;

    fn name(&self) -> String {
        "AnalyticDiscreteGeometricAsianEngine".into()
    }

    fn dependencies(&self) -> Vec<&dyn Observable> {
        vec![self.process.as_ref()]
    }

    fn calculate(
        &self,
        arguments: &AsianOptionArguments,
        results: &mut EngineResults,
    ) -> QuantResult<()> {
        if arguments.average_type != AverageType::Geometric {
            return Err(QuantwireError::calculation(
                self.name(),
                "not a geometric average option",
            ));
        }
        let (payoff, exercise_date) = match (arguments.payoff, arguments.exercise_date) {
            (Some(p), Some(e)) => (p, e),
            _ => return Err(QuantwireError::invalid_input("incomplete Asian option arguments")),
        };

        let risk_free = self.process.risk_free_rate().get_link()?;
        let dividend = self.process.dividend_yield().get_link()?;
        let reference_date = risk_free.reference_date()?;

        let past = arguments.past_fixings;
        let fixing_times: Vec<f64> = arguments
            .fixing_dates
            .iter()
            .filter(|d| **d >= reference_date)
            .map(|d| Date::year_fraction(reference_date, *d))
            .collect();
        let remaining = fixing_times.len();
        let n = past + remaining;
        if n == 0 {
            return Err(QuantwireError::calculation(self.name(), "no fixings left"));
        }
        let n_f = n as f64;

        let running_log = if past > 0 {
            arguments.running_accumulator.ln()
        } else {
            0.0
        };
        let past_weight = past as f64 / n_f;
        let future_weight = 1.0 - past_weight;

        let time_sum: f64 = fixing_times.iter().sum();
        // Each future fixing t_i (0-based) is shared with the n-p-1-i later ones.
        let cross: f64 = fixing_times
            .iter()
            .enumerate()
            .map(|(i, t)| t * (remaining - 1 - i) as f64)
            .sum();

        let vol = self.process.volatility_value()?;
        let variance = vol * vol / (n_f * n_f) * (time_sum + 2.0 * cross);
        if variance < 0.0 {
            return Err(QuantwireError::calculation(self.name(), "negative variance"));
        }

        let spot = self.process.spot_value()?;
        if spot <= 0.0 {
            return Err(QuantwireError::invalid_input(format!(
                "non-positive spot {spot}"
            )));
        }
        let risk_free_rate = risk_free.zero_rate(exercise_date)?;
        let dividend_rate = dividend.zero_rate(exercise_date)?;
        let nu = risk_free_rate - dividend_rate - 0.5 * vol * vol;

        let mu_g = past_weight * running_log + future_weight * spot.ln() + nu * time_sum / n_f;
        let forward = (mu_g + 0.5 * variance).exp();
        let discount = risk_free.discount(exercise_date)?;

        let black = black_formula(
            payoff.option_type,
            payoff.strike,
            forward,
            variance.sqrt(),
            discount,
        );

        results.value = Some(black.value);
        results.valuation_date = Some(reference_date);
        results.insert("delta", future_weight * black.forward_delta * forward / spot);
        results.insert("variance", variance);
        results.insert("forward", forward);

        tracing::trace!(
            engine = %self.name(),
            fixings = n,
            past,
            variance,
            value = black.value,
            "Priced geometric Asian"
        );
        Ok(())
    }
}
