//! Priced instruments.
//!
//! An [`Instrument`] is a lazy object whose recalculation delegates to a
//! shared [`PricingEngine`]:
//!
//! 1. the terms fill the engine's arguments ([`InstrumentTerms::setup_arguments`]),
//! 2. the engine validates and prices them,
//! 3. the terms read the engine's results back ([`InstrumentTerms::fetch_results`]).
//!
//! Expired instruments skip the engine and report a zero value.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use quantwire_core::{
    Calculation, Date, LazyObject, LazyOptions, LazyStats, Observable, ObserverRegistry,
    QuantResult, QuantwireError,
};

use crate::engine::{Arguments, ArgumentsKind, PricingEngine, Results};

/// Values an instrument exposes after pricing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentResults {
    /// Net present value.
    pub value: Option<f64>,
    /// Error estimate of the NPV.
    pub error_estimate: Option<f64>,
    /// Date the NPV refers to.
    pub valuation_date: Option<Date>,
    /// Named secondary results.
    pub additional_results: BTreeMap<String, f64>,
}

impl InstrumentResults {
    /// Results of an expired instrument.
    pub fn expired() -> Self {
        Self {
            value: Some(0.0),
            error_estimate: Some(0.0),
            ..Self::default()
        }
    }
}

/// Contract terms of an instrument.
pub trait InstrumentTerms: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> String;

    /// Observables besides the engine whose changes invalidate the price.
    fn dependencies(&self) -> Vec<&dyn Observable> {
        Vec::new()
    }

    /// Shape of the arguments the terms fill.
    fn arguments_kind(&self) -> ArgumentsKind;

    /// Returns true if the instrument has no remaining value.
    fn is_expired(&self) -> QuantResult<bool>;

    /// Fills the engine's arguments.
    ///
    /// Fails with `ArgumentsTypeMismatch` when `arguments` is not of the
    /// shape this instrument fills.
    fn setup_arguments(&self, arguments: &mut dyn Arguments) -> QuantResult<()>;

    /// Reads the engine's results back.
    fn fetch_results(&self, results: &dyn Results) -> QuantResult<InstrumentResults> {
        Ok(InstrumentResults {
            value: results.value(),
            error_estimate: results.error_estimate(),
            valuation_date: results.valuation_date(),
            additional_results: results.additional_results().clone(),
        })
    }
}

/// Downcasts engine arguments to the concrete shape an instrument fills.
pub fn downcast_arguments<'a, A: Arguments>(
    context: &str,
    expected: ArgumentsKind,
    arguments: &'a mut dyn Arguments,
) -> QuantResult<&'a mut A> {
    let found = arguments.kind();
    arguments
        .as_any_mut()
        .downcast_mut::<A>()
        .ok_or_else(|| QuantwireError::arguments_mismatch(context, expected, found))
}

struct Pricing<T: InstrumentTerms> {
    terms: T,
    engine: RwLock<Option<Arc<dyn PricingEngine>>>,
}

impl<T: InstrumentTerms> Calculation for Pricing<T> {
    type Output = InstrumentResults;

    fn name(&self) -> String {
        self.terms.name()
    }

    fn dependencies(&self) -> Vec<&dyn Observable> {
        self.terms.dependencies()
    }

    fn perform_calculations(&self) -> QuantResult<InstrumentResults> {
        if self.terms.is_expired()? {
            tracing::debug!(instrument = %self.terms.name(), "Expired, skipping engine");
            return Ok(InstrumentResults::expired());
        }

        let engine = self
            .engine
            .read()
            .clone()
            .ok_or_else(|| QuantwireError::calculation(self.terms.name(), "null pricing engine"))?;

        engine.reset();
        engine.with_arguments(&mut |arguments| self.terms.setup_arguments(arguments))?;
        engine.calculate()?;

        let mut fetched = None;
        engine.with_results(&mut |results| {
            fetched = Some(self.terms.fetch_results(results)?);
            Ok(())
        })?;
        fetched.ok_or_else(|| QuantwireError::calculation(self.terms.name(), "no results"))
    }
}

/// An instrument priced by a pluggable engine.
pub struct Instrument<T: InstrumentTerms> {
    lazy: Arc<LazyObject<Pricing<T>>>,
}

impl<T: InstrumentTerms> Instrument<T> {
    /// Creates an instrument, optionally with an engine.
    pub fn new(terms: T, engine: Option<Arc<dyn PricingEngine>>) -> Self {
        Self::with_options(terms, engine, LazyOptions::default())
    }

    /// Creates an instrument with explicit lazy-object options.
    pub fn with_options(
        terms: T,
        engine: Option<Arc<dyn PricingEngine>>,
        options: LazyOptions,
    ) -> Self {
        let lazy = LazyObject::with_options(
            Pricing {
                terms,
                engine: RwLock::new(None),
            },
            options,
        );
        if let Some(engine) = &engine {
            lazy.register_with(engine.as_ref());
        }
        *lazy.calculation().engine.write() = engine;
        Self { lazy }
    }

    /// The contract terms.
    pub fn terms(&self) -> &T {
        &self.lazy.calculation().terms
    }

    /// Name of the instrument.
    pub fn name(&self) -> &str {
        self.lazy.name()
    }

    /// Replaces the engine and invalidates the instrument.
    pub fn set_pricing_engine(&self, engine: Arc<dyn PricingEngine>) -> QuantResult<()> {
        let previous = self.lazy.calculation().engine.write().replace(engine.clone());
        if let Some(previous) = previous {
            self.lazy.unregister_with(previous.as_ref());
        }
        self.lazy.register_with(engine.as_ref());
        tracing::debug!(instrument = %self.name(), engine = %engine.name(), "Pricing engine set");
        self.lazy.invalidate()
    }

    /// Returns true if the instrument has no remaining value.
    pub fn is_expired(&self) -> QuantResult<bool> {
        self.lazy.calculation().terms.is_expired()
    }

    /// All results, recalculating if needed.
    pub fn results(&self) -> QuantResult<InstrumentResults> {
        self.lazy.calculate()
    }

    /// Net present value.
    pub fn npv(&self) -> QuantResult<f64> {
        self.results()?
            .value
            .ok_or_else(|| QuantwireError::calculation(self.name(), "NPV not provided"))
    }

    /// Error estimate of the NPV.
    pub fn error_estimate(&self) -> QuantResult<f64> {
        self.results()?
            .error_estimate
            .ok_or_else(|| QuantwireError::calculation(self.name(), "error estimate not provided"))
    }

    /// Date the NPV refers to.
    pub fn valuation_date(&self) -> QuantResult<Date> {
        self.results()?
            .valuation_date
            .ok_or_else(|| QuantwireError::calculation(self.name(), "valuation date not provided"))
    }

    /// A named secondary result.
    pub fn result(&self, name: &str) -> QuantResult<f64> {
        self.results()?
            .additional_results
            .get(name)
            .copied()
            .ok_or_else(|| QuantwireError::calculation(self.name(), format!("{name} not provided")))
    }

    /// Suppresses recalculation.
    pub fn freeze(&self) {
        self.lazy.freeze();
    }

    /// Lifts a freeze.
    pub fn unfreeze(&self) -> QuantResult<()> {
        self.lazy.unfreeze()
    }

    /// Reprices unconditionally.
    pub fn recalculate(&self) -> QuantResult<InstrumentResults> {
        self.lazy.recalculate()
    }

    /// Returns true if the next read reprices.
    pub fn is_dirty(&self) -> bool {
        self.lazy.is_dirty()
    }

    /// Returns true if recalculation is suppressed.
    pub fn is_frozen(&self) -> bool {
        self.lazy.is_frozen()
    }

    /// Recalculation counters.
    pub fn stats(&self) -> LazyStats {
        self.lazy.stats()
    }
}

impl<T: InstrumentTerms> Observable for Instrument<T> {
    fn observers(&self) -> &ObserverRegistry {
        self.lazy.observers()
    }
}

impl<T: InstrumentTerms> fmt::Debug for Instrument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.lazy.name())
            .field("dirty", &self.lazy.is_dirty())
            .field("frozen", &self.lazy.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCalculator, EngineResults, GenericEngine};
    use quantwire_core::{
        downgrade_observer, ForwardPolicy, Handle, ObservableId, Observer, Payload, Quote,
        SimpleQuote,
    };
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct ForwardArguments {
        notional: f64,
    }

    impl Arguments for ForwardArguments {
        fn kind(&self) -> ArgumentsKind {
            ArgumentsKind::Custom("Forward".into())
        }

        fn validate(&self) -> QuantResult<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct OtherArguments;

    impl Arguments for OtherArguments {
        fn kind(&self) -> ArgumentsKind {
            ArgumentsKind::Custom("Other".into())
        }

        fn validate(&self) -> QuantResult<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct ForwardCalculator {
        price: Handle<dyn Quote>,
        runs: Arc<AtomicUsize>,
    }

    impl EngineCalculator for ForwardCalculator {
        type Arguments = ForwardArguments;

        fn name(&self) -> String {
            "ForwardEngine".into()
        }

        fn dependencies(&self) -> Vec<&dyn Observable> {
            vec![&self.price]
        }

        fn calculate(
            &self,
            arguments: &ForwardArguments,
            results: &mut EngineResults,
        ) -> QuantResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let price = self.price.get_link()?.value()?;
            results.value = Some(arguments.notional * price);
            results.error_estimate = Some(0.0);
            results.insert("price", price);
            Ok(())
        }
    }

    struct OtherCalculator;

    impl EngineCalculator for OtherCalculator {
        type Arguments = OtherArguments;

        fn name(&self) -> String {
            "OtherEngine".into()
        }

        fn calculate(&self, _: &OtherArguments, results: &mut EngineResults) -> QuantResult<()> {
            results.value = Some(1.0);
            Ok(())
        }
    }

    struct Forward {
        notional: f64,
        expired: AtomicBool,
    }

    impl Forward {
        fn new(notional: f64) -> Self {
            Self {
                notional,
                expired: AtomicBool::new(false),
            }
        }
    }

    impl InstrumentTerms for Forward {
        fn name(&self) -> String {
            "Forward".into()
        }

        fn arguments_kind(&self) -> ArgumentsKind {
            ArgumentsKind::Custom("Forward".into())
        }

        fn is_expired(&self) -> QuantResult<bool> {
            Ok(self.expired.load(Ordering::SeqCst))
        }

        fn setup_arguments(&self, arguments: &mut dyn Arguments) -> QuantResult<()> {
            let arguments: &mut ForwardArguments =
                downcast_arguments("Forward", self.arguments_kind(), arguments)?;
            arguments.notional = self.notional;
            Ok(())
        }
    }

    fn forward_engine(
        price: &Arc<SimpleQuote>,
    ) -> (Arc<dyn PricingEngine>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let target: Arc<dyn Quote> = price.clone();
        let engine = GenericEngine::new(ForwardCalculator {
            price: Handle::new(target),
            runs: runs.clone(),
        });
        (engine, runs)
    }

    #[test]
    fn test_npv_and_additional_results() {
        let price = Arc::new(SimpleQuote::new("price", 50.0));
        let (engine, runs) = forward_engine(&price);
        let fwd = Instrument::new(Forward::new(2.0), Some(engine));

        assert_eq!(fwd.npv().unwrap(), 100.0);
        assert_eq!(fwd.error_estimate().unwrap(), 0.0);
        assert_eq!(fwd.result("price").unwrap(), 50.0);
        assert!(fwd.result("gamma").is_err());
        assert!(fwd.valuation_date().is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        price.set_value(60.0).unwrap();
        assert!(fwd.is_dirty());
        assert_eq!(fwd.npv().unwrap(), 120.0);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_engine_fails() {
        let fwd = Instrument::new(Forward::new(1.0), None);
        let err = fwd.npv().unwrap_err();
        assert!(matches!(err, QuantwireError::Calculation { .. }));
        assert!(err.to_string().contains("null pricing engine"));
    }

    #[test]
    fn test_expired_skips_engine() {
        let price = Arc::new(SimpleQuote::new("price", 50.0));
        let (engine, runs) = forward_engine(&price);
        let terms = Forward::new(2.0);
        terms.expired.store(true, Ordering::SeqCst);
        let fwd = Instrument::new(terms, Some(engine));

        assert_eq!(fwd.npv().unwrap(), 0.0);
        assert_eq!(fwd.error_estimate().unwrap(), 0.0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wrong_engine_is_type_mismatch() {
        let engine: Arc<dyn PricingEngine> = GenericEngine::new(OtherCalculator);
        let fwd = Instrument::new(Forward::new(1.0), Some(engine));
        assert!(matches!(
            fwd.npv(),
            Err(QuantwireError::ArgumentsTypeMismatch { .. })
        ));
        assert!(fwd.is_dirty());
    }

    #[test]
    fn test_set_pricing_engine_moves_subscription() {
        let old_price = Arc::new(SimpleQuote::new("old", 1.0));
        let new_price = Arc::new(SimpleQuote::new("new", 3.0));
        let (old_engine, _) = forward_engine(&old_price);
        let (new_engine, _) = forward_engine(&new_price);
        let fwd = Instrument::new(Forward::new(1.0), Some(old_engine.clone()));
        assert_eq!(fwd.npv().unwrap(), 1.0);

        fwd.set_pricing_engine(new_engine).unwrap();
        assert_eq!(fwd.npv().unwrap(), 3.0);
        assert_eq!(old_engine.count_observers(), 0);

        old_price.set_value(2.0).unwrap();
        assert!(!fwd.is_dirty());
    }

    #[test]
    fn test_shared_engine_serves_two_instruments() {
        let price = Arc::new(SimpleQuote::new("price", 10.0));
        let (engine, runs) = forward_engine(&price);
        let small = Instrument::new(Forward::new(1.0), Some(engine.clone()));
        let large = Instrument::new(Forward::new(5.0), Some(engine));

        assert_eq!(small.npv().unwrap(), 10.0);
        assert_eq!(large.npv().unwrap(), 50.0);
        assert_eq!(small.npv().unwrap(), 10.0);

        price.set_value(11.0).unwrap();
        assert!(small.is_dirty());
        assert!(large.is_dirty());
        assert_eq!(large.npv().unwrap(), 55.0);
        assert_eq!(small.npv().unwrap(), 11.0);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    struct Counter(AtomicUsize);

    impl Observer for Counter {
        fn update(&self, _source: ObservableId, _payload: Option<&Payload>) -> QuantResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_options_control_forwarding() {
        let price = Arc::new(SimpleQuote::new("price", 10.0));
        let (engine, _) = forward_engine(&price);
        let fwd = Instrument::with_options(
            Forward::new(1.0),
            Some(engine),
            LazyOptions::default().with_forward_policy(ForwardPolicy::Never),
        );
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        fwd.add_observer(downgrade_observer(&counter));

        fwd.npv().unwrap();
        price.set_value(11.0).unwrap();
        assert!(fwd.is_dirty());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert_eq!(fwd.npv().unwrap(), 11.0);
    }

    #[test]
    fn test_freeze_and_recalculate() {
        let price = Arc::new(SimpleQuote::new("price", 10.0));
        let (engine, runs) = forward_engine(&price);
        let fwd = Instrument::new(Forward::new(1.0), Some(engine));
        fwd.npv().unwrap();

        fwd.freeze();
        price.set_value(12.0).unwrap();
        assert_eq!(fwd.npv().unwrap(), 10.0);

        assert_eq!(fwd.recalculate().unwrap().value, Some(12.0));
        assert!(fwd.is_frozen());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
