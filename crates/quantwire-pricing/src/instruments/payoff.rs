//! Option types and vanilla payoffs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Right to buy.
    Call,
    /// Right to sell.
    Put,
}

impl OptionType {
    /// +1 for calls, -1 for puts.
    pub fn sign(&self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "Call"),
            OptionType::Put => write!(f, "Put"),
        }
    }
}

/// Payoff `max(sign * (S - K), 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlainVanillaPayoff {
    /// Call or put.
    pub option_type: OptionType,
    /// Strike.
    pub strike: f64,
}

impl PlainVanillaPayoff {
    /// Creates a payoff.
    pub fn new(option_type: OptionType, strike: f64) -> Self {
        Self {
            option_type,
            strike,
        }
    }

    /// Payoff at the given underlying price.
    pub fn value(&self, price: f64) -> f64 {
        (self.option_type.sign() * (price - self.strike)).max(0.0)
    }
}
