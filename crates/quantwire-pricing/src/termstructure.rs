//! Yield term structures.

use std::fmt;
use std::sync::Arc;

use quantwire_core::{
    Calculation, Date, Handle, LazyObject, LazyStats, Observable, ObserverRegistry, QuantResult,
    QuantwireError, Quote, Settings, SimpleQuote,
};

/// A discount curve observed by instruments and engines.
pub trait YieldTermStructure: Observable {
    /// Date at which the discount factor is one.
    fn reference_date(&self) -> QuantResult<Date>;

    /// Discount factor from the reference date to `date`.
    fn discount(&self, date: Date) -> QuantResult<f64>;

    /// Act/365F time from the reference date to `date`.
    fn time_from_reference(&self, date: Date) -> QuantResult<f64> {
        Ok(Date::year_fraction(self.reference_date()?, date))
    }

    /// Simply-compounded forward rate between two dates.
    fn forward_rate(&self, start: Date, end: Date) -> QuantResult<f64> {
        let tau = Date::year_fraction(start, end);
        if tau <= 0.0 {
            return Err(QuantwireError::invalid_input(format!(
                "forward period {start} to {end} is empty"
            )));
        }
        Ok((self.discount(start)? / self.discount(end)? - 1.0) / tau)
    }

    /// Continuously-compounded zero rate to `date`.
    fn zero_rate(&self, date: Date) -> QuantResult<f64> {
        let t = self.time_from_reference(date)?;
        if t <= 0.0 {
            // Instantaneous rate at the reference date.
            let next = self.reference_date()?.add_days(1)?;
            let dt = Date::year_fraction(self.reference_date()?, next);
            return Ok(-self.discount(next)?.ln() / dt);
        }
        Ok(-self.discount(date)?.ln() / t)
    }
}

/// How a curve's reference date is determined.
#[derive(Clone)]
pub enum ReferenceDate {
    /// A fixed date.
    Fixed(Date),
    /// The evaluation date plus a number of calendar days.
    Floating {
        /// Evaluation-date context.
        settings: Arc<Settings>,
        /// Calendar days between evaluation and reference date.
        settlement_days: i64,
    },
}

impl fmt::Debug for ReferenceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceDate::Fixed(d) => write!(f, "Fixed({d})"),
            ReferenceDate::Floating {
                settings,
                settlement_days,
            } => write!(
                f,
                "Floating({} + {settlement_days}d)",
                settings.evaluation_date()
            ),
        }
    }
}

/// Snapshot of a flat curve's inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatCurveState {
    /// Continuously-compounded rate.
    pub rate: f64,
    /// Reference date.
    pub reference_date: Date,
}

struct FlatForwardCurve {
    name: String,
    rate: Handle<dyn Quote>,
    reference: ReferenceDate,
}

impl Calculation for FlatForwardCurve {
    type Output = FlatCurveState;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn dependencies(&self) -> Vec<&dyn Observable> {
        match &self.reference {
            ReferenceDate::Fixed(_) => vec![&self.rate],
            ReferenceDate::Floating { settings, .. } => {
                vec![&self.rate as &dyn Observable, settings.as_ref()]
            }
        }
    }

    fn perform_calculations(&self) -> QuantResult<FlatCurveState> {
        let rate = self.rate.get_link()?.value()?;
        let reference_date = match &self.reference {
            ReferenceDate::Fixed(d) => *d,
            ReferenceDate::Floating {
                settings,
                settlement_days,
            } => settings.evaluation_date().add_days(*settlement_days)?,
        };
        Ok(FlatCurveState {
            rate,
            reference_date,
        })
    }
}

/// Flat continuously-compounded curve driven by a rate quote.
pub struct FlatForward {
    lazy: Arc<LazyObject<FlatForwardCurve>>,
}

impl FlatForward {
    /// Curve anchored at a fixed reference date.
    pub fn new(reference_date: Date, rate: Handle<dyn Quote>) -> Self {
        Self::build(ReferenceDate::Fixed(reference_date), rate)
    }

    /// Curve whose reference date follows the evaluation date.
    pub fn floating(settings: Arc<Settings>, settlement_days: i64, rate: Handle<dyn Quote>) -> Self {
        Self::build(
            ReferenceDate::Floating {
                settings,
                settlement_days,
            },
            rate,
        )
    }

    /// Curve at a constant rate.
    pub fn with_rate(reference_date: Date, rate: f64) -> Self {
        let quote: Arc<dyn Quote> = Arc::new(SimpleQuote::new("flat rate", rate));
        Self::new(reference_date, Handle::new(quote))
    }

    fn build(reference: ReferenceDate, rate: Handle<dyn Quote>) -> Self {
        let lazy = LazyObject::new(FlatForwardCurve {
            name: "FlatForward".into(),
            rate,
            reference,
        });
        Self { lazy }
    }

    /// Current rate and reference date.
    pub fn state(&self) -> QuantResult<FlatCurveState> {
        self.lazy.calculate()
    }

    /// Current rate.
    pub fn rate(&self) -> QuantResult<f64> {
        Ok(self.state()?.rate)
    }

    /// Recalculation counters.
    pub fn stats(&self) -> LazyStats {
        self.lazy.stats()
    }
}

impl Observable for FlatForward {
    fn observers(&self) -> &ObserverRegistry {
        self.lazy.observers()
    }
}

impl YieldTermStructure for FlatForward {
    fn reference_date(&self) -> QuantResult<Date> {
        Ok(self.state()?.reference_date)
    }

    fn discount(&self, date: Date) -> QuantResult<f64> {
        let state = self.state()?;
        let t = Date::year_fraction(state.reference_date, date);
        Ok((-state.rate * t).exp())
    }

    fn zero_rate(&self, _date: Date) -> QuantResult<f64> {
        self.rate()
    }
}

impl fmt::Debug for FlatForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatForward")
            .field("reference", &self.lazy.calculation().reference)
            .field("state", &self.lazy.cached())
            .finish()
    }
}
