//! # Quantwire Pricing
//!
//! Instruments, engines and market structures wired through the
//! `quantwire-core` notification graph.
//!
//! # Modules
//!
//! - [`engine`]: the arguments/results/engine contract and [`GenericEngine`]
//! - [`instrument`]: lazily priced [`Instrument`]s
//! - [`termstructure`]: yield curves, including the quote-driven [`FlatForward`]
//! - [`process`]: the [`BlackScholesProcess`] market bundle
//! - [`instruments`]: Asian options and caps/floors
//! - [`engines`]: closed-form engines for them
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quantwire_core::prelude::*;
//! use quantwire_pricing::prelude::*;
//!
//! let today = Date::from_ymd(2025, 1, 2).unwrap();
//! let rate = Arc::new(SimpleQuote::new("rate", 0.03));
//! let rate_target: Arc<dyn Quote> = rate.clone();
//! let curve: Arc<dyn YieldTermStructure> =
//!     Arc::new(FlatForward::new(today, Handle::new(rate_target)));
//! let vol: Arc<dyn Quote> = Arc::new(SimpleQuote::new("vol", 0.2));
//!
//! let leg: Vec<FloatingRateCoupon> = (0..4)
//!     .map(|i| {
//!         let start = today.add_months(3 * i).unwrap();
//!         FloatingRateCoupon::new(start, today.add_months(3 * (i + 1)).unwrap(), 1e6)
//!     })
//!     .collect();
//! let cap = CapFloorInstrument::new(
//!     CapFloor::cap(leg, vec![0.03], Handle::new(curve)).unwrap(),
//!     Some(BlackCapFloorEngine::with_volatility(Handle::new(vol))),
//! );
//!
//! let before = cap.npv().unwrap();
//! rate.set_value(0.04).unwrap();
//! assert!(cap.npv().unwrap() > before);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod engine;
pub mod engines;
pub mod instrument;
pub mod instruments;
pub mod math;
pub mod process;
pub mod termstructure;

pub use engine::{
    Arguments, ArgumentsKind, EngineCalculator, EngineResults, GenericEngine, PricingEngine,
    Results,
};
pub use instrument::{Instrument, InstrumentResults, InstrumentTerms};
pub use process::BlackScholesProcess;
pub use termstructure::{FlatForward, YieldTermStructure};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::engine::{
        Arguments, ArgumentsKind, EngineCalculator, EngineResults, GenericEngine, PricingEngine,
        Results,
    };
    pub use crate::engines::{AnalyticDiscreteGeometricAsianEngine, BlackCapFloorEngine};
    pub use crate::instrument::{Instrument, InstrumentResults, InstrumentTerms};
    pub use crate::instruments::{
        AsianOption, AverageType, CapFloor, CapFloorInstrument, CapFloorType,
        DiscreteAveragingAsianOption, FloatingRateCoupon, OptionType, PlainVanillaPayoff,
    };
    pub use crate::process::BlackScholesProcess;
    pub use crate::termstructure::{FlatForward, YieldTermStructure};
}
