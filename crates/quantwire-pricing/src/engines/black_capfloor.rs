//! Black engine for caps, floors and collars.

use std::sync::Arc;

use quantwire_core::{Handle, Observable, QuantResult, QuantwireError, Quote};

use crate::engine::{EngineCalculator, EngineResults, GenericEngine};
use crate::instruments::capfloor::{CapFloorArguments, CapFloorType};
use crate::instruments::payoff::OptionType;
use crate::math::black_formula;

/// Pricing step of [`BlackCapFloorEngine`].
#[derive(Debug)]
pub struct BlackCapFloorCalculator {
    volatility: Handle<dyn Quote>,
}

/// Prices each optionlet with the Black formula on a flat volatility.
pub type BlackCapFloorEngine = GenericEngine<BlackCapFloorCalculator>;

impl BlackCapFloorEngine {
    /// Creates an engine on a flat volatility quote.
    pub fn with_volatility(volatility: Handle<dyn Quote>) -> Arc<Self> {
        GenericEngine::new(BlackCapFloorCalculator { volatility })
    }
}

impl EngineCalculator for BlackCapFloorCalculator {
    type Arguments = CapFloorArguments;

    fn name(&self) -> String {
        "BlackCapFloorEngine".into()
    }

    fn dependencies(&self) -> Vec<&dyn Observable> {
        vec![&self.volatility]
    }

    fn calculate(&self, arguments: &CapFloorArguments, results: &mut EngineResults) -> QuantResult<()> {
        let kind = arguments
            .cap_floor_type
            .ok_or_else(|| QuantwireError::invalid_input("cap/floor type not set"))?;
        let vol = self.volatility.get_link()?.value()?;
        if vol < 0.0 {
            return Err(QuantwireError::invalid_input(format!("negative volatility {vol}")));
        }

        let mut value = 0.0;
        let mut optionlets = 0usize;
        for i in 0..arguments.start_times.len() {
            // Already paid.
            if arguments.end_times[i] < 0.0 {
                continue;
            }
            let (Some(forward), Some(discount)) = (arguments.forwards[i], arguments.discounts[i])
            else {
                continue;
            };

            let std_dev = vol * arguments.fixing_times[i].max(0.0).sqrt();
            let weight = arguments.nominals[i] * arguments.gearings[i] * arguments.accrual_times[i];

            if matches!(kind, CapFloorType::Cap | CapFloorType::Collar) {
                let caplet = black_formula(
                    OptionType::Call,
                    arguments.cap_rates[i],
                    forward,
                    std_dev,
                    discount,
                );
                value += weight * caplet.value;
            }
            if matches!(kind, CapFloorType::Floor | CapFloorType::Collar) {
                let floorlet = black_formula(
                    OptionType::Put,
                    arguments.floor_rates[i],
                    forward,
                    std_dev,
                    discount,
                );
                match kind {
                    CapFloorType::Floor => value += weight * floorlet.value,
                    _ => value -= weight * floorlet.value,
                }
            }
            optionlets += 1;
        }

        results.value = Some(value);
        results.insert("optionlets", optionlets as f64);
        results.insert("volatility", vol);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::capfloor::{CapFloor, CapFloorInstrument, FloatingRateCoupon};
    use crate::engine::PricingEngine;
    use crate::termstructure::{FlatForward, YieldTermStructure};
    use approx::assert_relative_eq;
    use quantwire_core::{Date, SimpleQuote};

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd(y, m, d).unwrap()
    }

    fn leg(start: Date, count: usize) -> Vec<FloatingRateCoupon> {
        (0..count)
            .map(|i| {
                let s = start.add_months(6 * i as i32).unwrap();
                let e = start.add_months(6 * (i as i32 + 1)).unwrap();
                FloatingRateCoupon::new(s, e, 100.0)
            })
            .collect()
    }

    struct Setup {
        curve: Handle<dyn YieldTermStructure>,
        vol: Arc<SimpleQuote>,
        engine: Arc<dyn PricingEngine>,
    }

    fn setup(today: Date) -> Setup {
        let ts: Arc<dyn YieldTermStructure> = Arc::new(FlatForward::with_rate(today, 0.04));
        let vol = Arc::new(SimpleQuote::new("vol", 0.2));
        let v: Arc<dyn Quote> = vol.clone();
        Setup {
            curve: Handle::new(ts),
            vol,
            engine: BlackCapFloorEngine::with_volatility(Handle::new(v)),
        }
    }

    #[test]
    fn test_cap_floor_parity() {
        let today = date(2025, 1, 2);
        let s = setup(today);
        let strike = 0.04;
        let cap = CapFloorInstrument::new(
            CapFloor::cap(leg(today, 6), vec![strike], s.curve.clone()).unwrap(),
            Some(s.engine.clone()),
        );
        let floor = CapFloorInstrument::new(
            CapFloor::floor(leg(today, 6), vec![strike], s.curve.clone()).unwrap(),
            Some(s.engine.clone()),
        );

        // Cap - floor = payer swap at the strike.
        let curve = s.curve.get_link().unwrap();
        let swap: f64 = leg(today, 6)
            .iter()
            .map(|c| {
                let fwd = c.index_forward(curve.as_ref()).unwrap();
                c.nominal * c.accrual_period() * (fwd - strike) * curve.discount(c.payment_date).unwrap()
            })
            .sum();
        assert_relative_eq!(cap.npv().unwrap() - floor.npv().unwrap(), swap, epsilon = 1e-10);
    }

    #[test]
    fn test_collar_is_cap_minus_floor() {
        let today = date(2025, 1, 2);
        let s = setup(today);
        let cap = CapFloorInstrument::new(
            CapFloor::cap(leg(today, 4), vec![0.05], s.curve.clone()).unwrap(),
            Some(s.engine.clone()),
        );
        let floor = CapFloorInstrument::new(
            CapFloor::floor(leg(today, 4), vec![0.03], s.curve.clone()).unwrap(),
            Some(s.engine.clone()),
        );
        let collar = CapFloorInstrument::new(
            CapFloor::collar(leg(today, 4), vec![0.05], vec![0.03], s.curve.clone()).unwrap(),
            Some(s.engine.clone()),
        );
        assert_relative_eq!(
            collar.npv().unwrap(),
            cap.npv().unwrap() - floor.npv().unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_volatility_change_reprices() {
        let today = date(2025, 1, 2);
        let s = setup(today);
        let cap = CapFloorInstrument::new(
            CapFloor::cap(leg(today, 4), vec![0.04], s.curve.clone()).unwrap(),
            Some(s.engine.clone()),
        );
        let low = cap.npv().unwrap();
        s.vol.set_value(0.3).unwrap();
        assert!(cap.is_dirty());
        let high = cap.npv().unwrap();
        assert!(high > low);
        assert_eq!(cap.result("volatility").unwrap(), 0.3);
    }

    #[test]
    fn test_past_optionlets_are_skipped() {
        let start = date(2024, 1, 2);
        let today = date(2025, 1, 2);
        let s = setup(today);
        let cap = CapFloorInstrument::new(
            CapFloor::cap(leg(start, 4), vec![0.04], s.curve.clone()).unwrap(),
            Some(s.engine.clone()),
        );
        // One coupon paid before the reference date, one paying on it.
        assert_eq!(cap.result("optionlets").unwrap(), 3.0);
    }
}
