//! End-to-end pricing scenarios.
//!
//! Instruments, shared engines, curves and quotes wired together:
//! - Geometric Asian with a single fixing reduces to Black-Scholes
//! - Mismatched engine and instrument shapes fail without results
//! - Market, evaluation-date and relink events reprice exactly once
//! - Collars price as a long cap and a short floor for any strikes

use std::sync::Arc;

use approx::assert_relative_eq;
use proptest::prelude::*;
use quantwire_core::prelude::*;
use quantwire_pricing::prelude::*;

// =============================================================================
// FIXTURES
// =============================================================================

fn date(y: i32, m: u32, d: u32) -> Date {
    Date::from_ymd(y, m, d).unwrap()
}

struct Market {
    settings: Arc<Settings>,
    spot: Arc<SimpleQuote>,
    vol: Arc<SimpleQuote>,
    rate: Arc<SimpleQuote>,
    process: Arc<BlackScholesProcess>,
}

fn market(today: Date) -> Market {
    let settings = Arc::new(Settings::new(today));
    let spot = Arc::new(SimpleQuote::new("spot", 100.0));
    let vol = Arc::new(SimpleQuote::new("vol", 0.2));
    let rate = Arc::new(SimpleQuote::new("rate", 0.05));

    let rate_target: Arc<dyn Quote> = rate.clone();
    let risk_free: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::floating(
        settings.clone(),
        0,
        Handle::new(rate_target),
    ));
    let dividend: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.0));
    let spot_target: Arc<dyn Quote> = spot.clone();
    let vol_target: Arc<dyn Quote> = vol.clone();

    let process = BlackScholesProcess::new(
        Handle::new(spot_target),
        Handle::new(dividend),
        Handle::new(risk_free),
        Handle::new(vol_target),
    );
    Market {
        settings,
        spot,
        vol,
        rate,
        process,
    }
}

fn geometric_call(m: &Market, fixings: Vec<Date>, expiry: Date) -> AsianOption {
    let engine = AnalyticDiscreteGeometricAsianEngine::with_process(m.process.clone());
    AsianOption::new(
        DiscreteAveragingAsianOption::new(
            AverageType::Geometric,
            1.0,
            0,
            fixings,
            PlainVanillaPayoff::new(OptionType::Call, 100.0),
            expiry,
            m.settings.clone(),
        ),
        Some(engine),
    )
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_single_fixing_geometric_asian_is_black_scholes() {
    let today = date(2025, 1, 1);
    let expiry = date(2026, 1, 1);
    let m = market(today);
    let option = geometric_call(&m, vec![expiry], expiry);

    // S = K = 100, r = 5%, q = 0, sigma = 20%, T = 1y.
    assert_relative_eq!(option.npv().unwrap(), 10.450_583_572_185_565, epsilon = 1e-8);
    assert_relative_eq!(option.result("delta").unwrap(), 0.636_830_651_175_619, epsilon = 1e-8);
    assert_relative_eq!(option.result("variance").unwrap(), 0.04, epsilon = 1e-12);
    assert_eq!(option.valuation_date().unwrap(), today);
}

#[test]
fn test_averaging_lowers_the_price() {
    let today = date(2025, 1, 1);
    let expiry = date(2026, 1, 1);
    let m = market(today);
    let monthly: Vec<Date> = (1..=12).map(|i| today.add_months(i).unwrap()).collect();

    let european_like = geometric_call(&m, vec![expiry], expiry);
    let averaged = geometric_call(&m, monthly, expiry);
    assert!(averaged.npv().unwrap() < european_like.npv().unwrap());
    assert!(averaged.result("variance").unwrap() < 0.04);
}

#[test]
fn test_arithmetic_averaging_is_rejected() {
    let today = date(2025, 1, 1);
    let m = market(today);
    let engine = AnalyticDiscreteGeometricAsianEngine::with_process(m.process.clone());
    let option = AsianOption::new(
        DiscreteAveragingAsianOption::new(
            AverageType::Arithmetic,
            0.0,
            0,
            vec![date(2025, 6, 1)],
            PlainVanillaPayoff::new(OptionType::Put, 100.0),
            date(2025, 6, 1),
            m.settings.clone(),
        ),
        Some(engine),
    );
    assert!(matches!(
        option.npv(),
        Err(QuantwireError::Calculation { .. })
    ));
}

#[test]
fn test_cap_on_asian_engine_is_type_mismatch() {
    let today = date(2025, 1, 1);
    let m = market(today);
    let engine = AnalyticDiscreteGeometricAsianEngine::with_process(m.process.clone());
    assert_eq!(engine.arguments_kind(), ArgumentsKind::AsianOption);

    let curve: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.03));
    let leg = vec![FloatingRateCoupon::new(
        date(2025, 1, 1),
        date(2025, 7, 1),
        1_000_000.0,
    )];
    let shared: Arc<dyn PricingEngine> = engine.clone();
    let cap = CapFloorInstrument::new(
        CapFloor::cap(leg, vec![0.03], Handle::new(curve)).unwrap(),
        Some(shared),
    );

    let err = cap.npv().unwrap_err();
    assert!(matches!(err, QuantwireError::ArgumentsTypeMismatch { .. }));
    assert!(!err.is_retryable());
    assert!(cap.is_dirty());
    assert_eq!(engine.results().value, None);
}

#[test]
fn test_market_events_reprice_once() {
    let today = date(2025, 1, 1);
    let expiry = date(2026, 1, 1);
    let m = market(today);
    let option = geometric_call(&m, vec![date(2025, 7, 1), expiry], expiry);

    let base = option.npv().unwrap();
    option.npv().unwrap();
    assert_eq!(option.stats().recalculations, 1);

    m.spot.set_value(105.0).unwrap();
    let bumped = option.npv().unwrap();
    assert!(bumped > base);
    assert_eq!(option.stats().recalculations, 2);

    m.vol.set_value(0.25).unwrap();
    m.rate.set_value(0.04).unwrap();
    option.npv().unwrap();
    assert_eq!(option.stats().recalculations, 3);
}

#[test]
fn test_evaluation_date_drives_expiry() {
    let today = date(2025, 1, 1);
    let expiry = date(2025, 6, 1);
    let m = market(today);
    let option = geometric_call(&m, vec![expiry], expiry);
    assert!(option.npv().unwrap() > 0.0);

    m.settings.set_evaluation_date(date(2025, 6, 2)).unwrap();
    assert!(option.is_dirty());
    assert!(option.is_expired().unwrap());
    assert_eq!(option.npv().unwrap(), 0.0);
}

#[test]
fn test_relinking_the_curve_reprices_the_cap() {
    let today = date(2025, 1, 2);
    let low: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.02));
    let high: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.06));
    let curve: Handle<dyn YieldTermStructure> = Handle::new(low);
    let vol: Arc<dyn Quote> = Arc::new(SimpleQuote::new("vol", 0.2));

    let leg: Vec<FloatingRateCoupon> = (0..8)
        .map(|i| {
            FloatingRateCoupon::new(
                today.add_months(3 * i).unwrap(),
                today.add_months(3 * (i + 1)).unwrap(),
                1_000_000.0,
            )
        })
        .collect();
    let cap = CapFloorInstrument::new(
        CapFloor::cap(leg, vec![0.04], curve.clone()).unwrap(),
        Some(BlackCapFloorEngine::with_volatility(Handle::new(vol))),
    );

    let cheap = cap.npv().unwrap();
    curve.set_link(high, true).unwrap();
    assert!(cap.is_dirty());
    let rich = cap.npv().unwrap();
    assert!(rich > cheap);
    assert_eq!(cap.stats().recalculations, 2);
}

proptest! {
    #[test]
    fn prop_collar_is_cap_minus_floor(
        floor_strike in 0.005f64..0.04,
        width in 0.0f64..0.04,
        vol in 0.01f64..0.6,
        rate in 0.0f64..0.08,
    ) {
        let today = date(2025, 1, 2);
        let cap_strike = floor_strike + width;
        let ts: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, rate));
        let curve: Handle<dyn YieldTermStructure> = Handle::new(ts);
        let quote: Arc<dyn Quote> = Arc::new(SimpleQuote::new("vol", vol));
        let engine: Arc<dyn PricingEngine> = BlackCapFloorEngine::with_volatility(Handle::new(quote));

        let leg: Vec<FloatingRateCoupon> = (0..6)
            .map(|i| {
                FloatingRateCoupon::new(
                    today.add_months(6 * i).unwrap(),
                    today.add_months(6 * (i + 1)).unwrap(),
                    100.0,
                )
            })
            .collect();
        let price = |terms: CapFloor| {
            CapFloorInstrument::new(terms, Some(engine.clone())).npv().unwrap()
        };

        let cap = price(CapFloor::cap(leg.clone(), vec![cap_strike], curve.clone()).unwrap());
        let floor = price(CapFloor::floor(leg.clone(), vec![floor_strike], curve.clone()).unwrap());
        let collar = price(
            CapFloor::collar(leg, vec![cap_strike], vec![floor_strike], curve).unwrap(),
        );

        prop_assert!(cap >= 0.0 && floor >= 0.0);
        prop_assert!((collar - (cap - floor)).abs() < 1e-9);
    }
}
