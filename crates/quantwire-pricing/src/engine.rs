//! The arguments/results/engine contract.
//!
//! An instrument prices itself by filling an engine's [`Arguments`], asking
//! the engine to [`PricingEngine::calculate`], and reading its [`Results`].
//! Engines are shared and observable: a change to any of their market inputs
//! is forwarded to every instrument that registered with them.
//!
//! [`GenericEngine`] supplies the plumbing (typed argument and result slots,
//! validation, memoization); concrete engines only implement
//! [`EngineCalculator`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use quantwire_core::{
    Calculation, Date, LazyObject, LazyOptions, LazyStats, Observable, ObserverRegistry,
    QuantResult,
};

// =============================================================================
// ARGUMENTS AND RESULTS
// =============================================================================

/// Discriminates argument and result shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentsKind {
    /// Discrete-averaging Asian option.
    AsianOption,
    /// Cap, floor or collar.
    CapFloor,
    /// Engine-specific arguments.
    Custom(String),
}

impl fmt::Display for ArgumentsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentsKind::AsianOption => write!(f, "AsianOption"),
            ArgumentsKind::CapFloor => write!(f, "CapFloor"),
            ArgumentsKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Inputs an instrument hands to its engine.
pub trait Arguments: Any + Send + Sync + fmt::Debug {
    /// Shape of these arguments.
    fn kind(&self) -> ArgumentsKind;

    /// Checks internal consistency before calculation.
    fn validate(&self) -> QuantResult<()>;

    /// Upcast for checked downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for checked downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Outputs an engine produces.
pub trait Results: Any + Send + Sync + fmt::Debug {
    /// Shape of these results.
    fn kind(&self) -> ArgumentsKind;

    /// Clears every result.
    fn reset(&mut self);

    /// Main value, if computed.
    fn value(&self) -> Option<f64>;

    /// Error estimate of the main value, if computed.
    fn error_estimate(&self) -> Option<f64> {
        None
    }

    /// Date the results refer to, if known.
    fn valuation_date(&self) -> Option<Date> {
        None
    }

    /// Named secondary results.
    fn additional_results(&self) -> &BTreeMap<String, f64>;

    /// Upcast for checked downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Result slot shared by the engines of this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResults {
    /// Shape these results belong to.
    pub kind: ArgumentsKind,
    /// Main value.
    pub value: Option<f64>,
    /// Error estimate of the main value.
    pub error_estimate: Option<f64>,
    /// Valuation date.
    pub valuation_date: Option<Date>,
    /// Named secondary results.
    pub additional_results: BTreeMap<String, f64>,
}

impl EngineResults {
    /// Creates an empty result slot.
    pub fn new(kind: ArgumentsKind) -> Self {
        Self {
            kind,
            value: None,
            error_estimate: None,
            valuation_date: None,
            additional_results: BTreeMap::new(),
        }
    }

    /// Records a named secondary result.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.additional_results.insert(name.into(), value);
    }
}

impl Results for EngineResults {
    fn kind(&self) -> ArgumentsKind {
        self.kind.clone()
    }

    fn reset(&mut self) {
        self.value = None;
        self.error_estimate = None;
        self.valuation_date = None;
        self.additional_results.clear();
    }

    fn value(&self) -> Option<f64> {
        self.value
    }

    fn error_estimate(&self) -> Option<f64> {
        self.error_estimate
    }

    fn valuation_date(&self) -> Option<Date> {
        self.valuation_date
    }

    fn additional_results(&self) -> &BTreeMap<String, f64> {
        &self.additional_results
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// PRICING ENGINE
// =============================================================================

/// A shared, observable pricing engine.
pub trait PricingEngine: Observable {
    /// Name used in logs and errors.
    fn name(&self) -> String;

    /// Shape of the arguments this engine accepts.
    fn arguments_kind(&self) -> ArgumentsKind;

    /// Gives `f` mutable access to the engine's arguments.
    fn with_arguments(
        &self,
        f: &mut dyn FnMut(&mut dyn Arguments) -> QuantResult<()>,
    ) -> QuantResult<()>;

    /// Gives `f` read access to the engine's results.
    fn with_results(&self, f: &mut dyn FnMut(&dyn Results) -> QuantResult<()>)
        -> QuantResult<()>;

    /// Clears the results.
    fn reset(&self);

    /// Validates the arguments and computes the results.
    fn calculate(&self) -> QuantResult<()>;
}

/// The pricing step of a [`GenericEngine`].
pub trait EngineCalculator: Send + Sync + 'static {
    /// Argument type filled by instruments.
    type Arguments: Arguments + Default + Clone + PartialEq;

    /// Name used in logs and errors.
    fn name(&self) -> String;

    /// Market inputs the engine observes.
    fn dependencies(&self) -> Vec<&dyn Observable> {
        Vec::new()
    }

    /// Prices `arguments` into `results`.
    fn calculate(&self, arguments: &Self::Arguments, results: &mut EngineResults)
        -> QuantResult<()>;
}

struct EngineCalculation<C: EngineCalculator> {
    calculator: C,
    kind: ArgumentsKind,
    arguments: RwLock<C::Arguments>,
}

impl<C: EngineCalculator> Calculation for EngineCalculation<C> {
    type Output = EngineResults;

    fn name(&self) -> String {
        self.calculator.name()
    }

    fn dependencies(&self) -> Vec<&dyn Observable> {
        self.calculator.dependencies()
    }

    fn perform_calculations(&self) -> QuantResult<EngineResults> {
        let arguments = self.arguments.read().clone();
        arguments.validate()?;

        let mut results = EngineResults::new(self.kind.clone());
        self.calculator.calculate(&arguments, &mut results)?;
        Ok(results)
    }
}

/// Engine with typed argument and result slots.
///
/// Results are memoized: calling [`PricingEngine::calculate`] again with
/// unchanged arguments and no upstream notification does not reprice.
pub struct GenericEngine<C: EngineCalculator> {
    lazy: Arc<LazyObject<EngineCalculation<C>>>,
    results: RwLock<EngineResults>,
}

impl<C: EngineCalculator> GenericEngine<C> {
    /// Wraps a calculator into a shareable engine.
    pub fn new(calculator: C) -> Arc<Self> {
        let kind = C::Arguments::default().kind();
        let calculation = EngineCalculation {
            calculator,
            kind: kind.clone(),
            arguments: RwLock::new(C::Arguments::default()),
        };
        // Engines are shared by several instruments; each of them must hear
        // about every market change.
        let lazy = LazyObject::with_options(calculation, LazyOptions::always_forward());
        Arc::new(Self {
            lazy,
            results: RwLock::new(EngineResults::new(kind)),
        })
    }

    /// The wrapped calculator.
    pub fn calculator(&self) -> &C {
        &self.lazy.calculation().calculator
    }

    /// Copy of the current arguments.
    pub fn arguments(&self) -> C::Arguments {
        self.lazy.calculation().arguments.read().clone()
    }

    /// Copy of the current results.
    pub fn results(&self) -> EngineResults {
        self.results.read().clone()
    }

    /// Recalculation counters.
    pub fn stats(&self) -> LazyStats {
        self.lazy.stats()
    }
}

impl<C: EngineCalculator> Observable for GenericEngine<C> {
    fn observers(&self) -> &ObserverRegistry {
        self.lazy.observers()
    }
}

impl<C: EngineCalculator> PricingEngine for GenericEngine<C> {
    fn name(&self) -> String {
        self.lazy.name().to_string()
    }

    fn arguments_kind(&self) -> ArgumentsKind {
        self.lazy.calculation().kind.clone()
    }

    fn with_arguments(
        &self,
        f: &mut dyn FnMut(&mut dyn Arguments) -> QuantResult<()>,
    ) -> QuantResult<()> {
        let slot = &self.lazy.calculation().arguments;
        let mut arguments = slot.read().clone();
        f(&mut arguments)?;

        let mut current = slot.write();
        if *current != arguments {
            *current = arguments;
            drop(current);
            self.lazy.mark_dirty();
        }
        Ok(())
    }

    fn with_results(
        &self,
        f: &mut dyn FnMut(&dyn Results) -> QuantResult<()>,
    ) -> QuantResult<()> {
        let results = self.results.read();
        f(&*results)
    }

    fn reset(&self) {
        self.results.write().reset();
    }

    fn calculate(&self) -> QuantResult<()> {
        match self.lazy.calculate() {
            Ok(results) => {
                *self.results.write() = results;
                Ok(())
            }
            Err(e) => {
                self.results.write().reset();
                Err(e)
            }
        }
    }
}

impl<C: EngineCalculator> fmt::Debug for GenericEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericEngine")
            .field("name", &self.lazy.name())
            .field("dirty", &self.lazy.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantwire_core::{Handle, Quote, QuantwireError, SimpleQuote};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct ScaleArguments {
        notional: Option<f64>,
    }

    impl Arguments for ScaleArguments {
        fn kind(&self) -> ArgumentsKind {
            ArgumentsKind::Custom("Scale".into())
        }

        fn validate(&self) -> QuantResult<()> {
            match self.notional {
                Some(n) if n > 0.0 => Ok(()),
                _ => Err(QuantwireError::invalid_input("notional must be positive")),
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct ScaleCalculator {
        factor: Handle<dyn Quote>,
        runs: AtomicUsize,
    }

    impl EngineCalculator for ScaleCalculator {
        type Arguments = ScaleArguments;

        fn name(&self) -> String {
            "ScaleEngine".into()
        }

        fn dependencies(&self) -> Vec<&dyn Observable> {
            vec![&self.factor]
        }

        fn calculate(
            &self,
            arguments: &ScaleArguments,
            results: &mut EngineResults,
        ) -> QuantResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let factor = self.factor.get_link()?.value()?;
            results.value = Some(arguments.notional.unwrap_or_default() * factor);
            results.insert("factor", factor);
            Ok(())
        }
    }

    fn engine(factor: &Arc<SimpleQuote>) -> Arc<GenericEngine<ScaleCalculator>> {
        let target: Arc<dyn Quote> = factor.clone();
        GenericEngine::new(ScaleCalculator {
            factor: Handle::new(target),
            runs: AtomicUsize::new(0),
        })
    }

    fn set_notional(engine: &dyn PricingEngine, notional: f64) -> QuantResult<()> {
        engine.with_arguments(&mut |args| {
            let args = args
                .as_any_mut()
                .downcast_mut::<ScaleArguments>()
                .ok_or_else(|| QuantwireError::arguments_mismatch("test", "Scale", "other"))?;
            args.notional = Some(notional);
            Ok(())
        })
    }

    fn value(engine: &dyn PricingEngine) -> Option<f64> {
        let mut out = None;
        engine
            .with_results(&mut |r| {
                out = r.value();
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_unchanged_arguments_do_not_reprice() {
        let factor = Arc::new(SimpleQuote::new("factor", 2.0));
        let engine = engine(&factor);

        set_notional(engine.as_ref(), 10.0).unwrap();
        engine.calculate().unwrap();
        set_notional(engine.as_ref(), 10.0).unwrap();
        engine.calculate().unwrap();
        assert_eq!(engine.calculator().runs.load(Ordering::SeqCst), 1);
        assert_eq!(value(engine.as_ref()), Some(20.0));

        set_notional(engine.as_ref(), 5.0).unwrap();
        engine.calculate().unwrap();
        assert_eq!(value(engine.as_ref()), Some(10.0));
        assert_eq!(engine.calculator().runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_market_change_reprices() {
        let factor = Arc::new(SimpleQuote::new("factor", 2.0));
        let engine = engine(&factor);
        set_notional(engine.as_ref(), 10.0).unwrap();
        engine.calculate().unwrap();

        factor.set_value(3.0).unwrap();
        engine.calculate().unwrap();
        assert_eq!(value(engine.as_ref()), Some(30.0));
        assert_eq!(engine.results().additional_results["factor"], 3.0);
    }

    #[test]
    fn test_invalid_arguments_leave_results_reset() {
        let factor = Arc::new(SimpleQuote::new("factor", 2.0));
        let engine = engine(&factor);
        set_notional(engine.as_ref(), 10.0).unwrap();
        engine.calculate().unwrap();

        set_notional(engine.as_ref(), -1.0).unwrap();
        assert!(matches!(
            engine.calculate(),
            Err(QuantwireError::InvalidInput { .. })
        ));
        assert_eq!(value(engine.as_ref()), None);
        assert_eq!(engine.calculator().runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_kind_and_reset() {
        let factor = Arc::new(SimpleQuote::new("factor", 2.0));
        let engine = engine(&factor);
        assert_eq!(
            engine.arguments_kind(),
            ArgumentsKind::Custom("Scale".into())
        );
        set_notional(engine.as_ref(), 1.0).unwrap();
        engine.calculate().unwrap();
        engine.reset();
        assert_eq!(value(engine.as_ref()), None);
        assert_eq!(engine.arguments().notional, Some(1.0));
    }
}
