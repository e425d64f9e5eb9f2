//! Instrument terms.

pub mod asian;
pub mod capfloor;
pub mod payoff;

pub use asian::{AsianOption, AsianOptionArguments, AverageType, DiscreteAveragingAsianOption};
pub use capfloor::{
    CapFloor, CapFloorArguments, CapFloorInstrument, CapFloorType, FloatingRateCoupon,
};
pub use payoff::{OptionType, PlainVanillaPayoff};
