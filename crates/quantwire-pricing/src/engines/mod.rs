//! Concrete pricing engines.

pub mod asian_geometric;
pub mod black_capfloor;

pub use asian_geometric::{AnalyticDiscreteGeometricAsianEngine, DiscreteGeometricAsianCalculator};
pub use black_capfloor::{BlackCapFloorCalculator, BlackCapFloorEngine};
