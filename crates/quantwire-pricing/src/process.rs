//! Black-Scholes-Merton process.

use std::fmt;
use std::sync::{Arc, Weak};

use quantwire_core::{
    Date, Handle, Observable, ObservableId, Observer, ObserverRegistry, Payload, QuantResult,
    Quote,
};

use crate::termstructure::YieldTermStructure;

/// Market inputs of a lognormal underlying.
///
/// Observes its four handles and forwards every notification it receives.
pub struct BlackScholesProcess {
    registry: ObserverRegistry,
    spot: Handle<dyn Quote>,
    dividend_ts: Handle<dyn YieldTermStructure>,
    risk_free_ts: Handle<dyn YieldTermStructure>,
    volatility: Handle<dyn Quote>,
    me: Weak<BlackScholesProcess>,
}

impl BlackScholesProcess {
    /// Creates a process and registers with its inputs.
    pub fn new(
        spot: Handle<dyn Quote>,
        dividend_ts: Handle<dyn YieldTermStructure>,
        risk_free_ts: Handle<dyn YieldTermStructure>,
        volatility: Handle<dyn Quote>,
    ) -> Arc<Self> {
        let process = Arc::new_cyclic(|me| Self {
            registry: ObserverRegistry::new("BlackScholesProcess"),
            spot,
            dividend_ts,
            risk_free_ts,
            volatility,
            me: me.clone(),
        });
        let me: Weak<dyn Observer> = process.me.clone();
        for input in process.inputs() {
            input.add_observer(me.clone());
        }
        process
    }

    fn inputs(&self) -> [&dyn Observable; 4] {
        [
            &self.spot,
            &self.dividend_ts,
            &self.risk_free_ts,
            &self.volatility,
        ]
    }

    /// Spot handle.
    pub fn spot(&self) -> &Handle<dyn Quote> {
        &self.spot
    }

    /// Dividend-yield curve handle.
    pub fn dividend_yield(&self) -> &Handle<dyn YieldTermStructure> {
        &self.dividend_ts
    }

    /// Risk-free curve handle.
    pub fn risk_free_rate(&self) -> &Handle<dyn YieldTermStructure> {
        &self.risk_free_ts
    }

    /// Flat Black volatility handle.
    pub fn volatility(&self) -> &Handle<dyn Quote> {
        &self.volatility
    }

    /// Current spot value.
    pub fn spot_value(&self) -> QuantResult<f64> {
        self.spot.get_link()?.value()
    }

    /// Current volatility value.
    pub fn volatility_value(&self) -> QuantResult<f64> {
        self.volatility.get_link()?.value()
    }

    /// Reference date of the risk-free curve.
    pub fn reference_date(&self) -> QuantResult<Date> {
        self.risk_free_ts.get_link()?.reference_date()
    }
}

impl Observer for BlackScholesProcess {
    fn update(&self, _source: ObservableId, payload: Option<&Payload>) -> QuantResult<()> {
        self.registry.notify(payload)
    }

    fn observer_name(&self) -> String {
        self.registry.label().to_string()
    }
}

impl Observable for BlackScholesProcess {
    fn observers(&self) -> &ObserverRegistry {
        &self.registry
    }
}

impl Drop for BlackScholesProcess {
    fn drop(&mut self) {
        let me: Weak<dyn Observer> = self.me.clone();
        for input in self.inputs() {
            input.delete_observer(&me);
        }
    }
}

impl fmt::Debug for BlackScholesProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlackScholesProcess")
            .field("spot", &self.spot)
            .field("volatility", &self.volatility)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::termstructure::FlatForward;
    use quantwire_core::{downgrade_observer, SimpleQuote};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Observer for Counter {
        fn update(&self, _source: ObservableId, _payload: Option<&Payload>) -> QuantResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_forwards_input_changes() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let spot = Arc::new(SimpleQuote::new("spot", 100.0));
        let vol = Arc::new(SimpleQuote::new("vol", 0.2));
        let s: Arc<dyn Quote> = spot.clone();
        let v: Arc<dyn Quote> = vol.clone();
        let q: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.0));
        let r: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.05));
        let risk_free = Handle::new(r);

        let process = BlackScholesProcess::new(
            Handle::new(s),
            Handle::new(q),
            risk_free.clone(),
            Handle::new(v),
        );
        let counter = Arc::new(Counter::default());
        process.add_observer(downgrade_observer(&counter));

        spot.set_value(101.0).unwrap();
        vol.set_value(0.25).unwrap();
        let other: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.04));
        risk_free.set_link(other, true).unwrap();

        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
        assert_eq!(process.spot_value().unwrap(), 101.0);
        assert_eq!(process.volatility_value().unwrap(), 0.25);
        assert_eq!(process.reference_date().unwrap(), today);
    }
}
