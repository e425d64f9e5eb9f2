//! Closed-form building blocks shared by the analytic engines.

use statrs::function::erf::erfc;

use crate::instruments::payoff::OptionType;

/// Standard normal cumulative distribution function.
#[inline]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Black price of an option on a lognormal forward and its derivative with
/// respect to the forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackValue {
    /// Discounted option value.
    pub value: f64,
    /// Sensitivity of `value` to the forward.
    pub forward_delta: f64,
}

/// Black (1976) formula.
///
/// A zero standard deviation returns the discounted intrinsic value.
pub fn black_formula(
    option_type: OptionType,
    strike: f64,
    forward: f64,
    std_dev: f64,
    discount: f64,
) -> BlackValue {
    let sign = option_type.sign();

    if std_dev <= 0.0 || strike <= 0.0 {
        let intrinsic = (sign * (forward - strike)).max(0.0);
        let in_the_money = sign * (forward - strike) > 0.0;
        return BlackValue {
            value: discount * intrinsic,
            forward_delta: if in_the_money { discount * sign } else { 0.0 },
        };
    }

    let d1 = ((forward / strike).ln() + 0.5 * std_dev * std_dev) / std_dev;
    let d2 = d1 - std_dev;
    let nd1 = normal_cdf(sign * d1);
    let nd2 = normal_cdf(sign * d2);

    BlackValue {
        value: discount * sign * (forward * nd1 - strike * nd2),
        forward_delta: discount * sign * nd1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_cdf() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_relative_eq!(normal_cdf(1.959_963_984_540_054), 0.975, epsilon = 1e-12);
        assert_relative_eq!(normal_cdf(-1.0) + normal_cdf(1.0), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_black_put_call_parity() {
        let (k, f, sd, df) = (0.05, 0.055, 0.2, 0.95);
        let call = black_formula(OptionType::Call, k, f, sd, df);
        let put = black_formula(OptionType::Put, k, f, sd, df);
        assert_relative_eq!(call.value - put.value, df * (f - k), epsilon = 1e-14);
        assert_relative_eq!(call.forward_delta - put.forward_delta, df, epsilon = 1e-14);
    }

    #[test]
    fn test_black_known_value() {
        // At-the-money forward, 20% vol, 1y, undiscounted.
        let call = black_formula(OptionType::Call, 100.0, 100.0, 0.2, 1.0);
        assert_relative_eq!(call.value, 7.965_567_455_405_804, epsilon = 1e-9);
    }

    #[test]
    fn test_black_zero_vol_is_intrinsic() {
        let call = black_formula(OptionType::Call, 0.04, 0.05, 0.0, 0.9);
        assert_relative_eq!(call.value, 0.9 * 0.01, epsilon = 1e-15);
        let put = black_formula(OptionType::Put, 0.04, 0.05, 0.0, 0.9);
        assert_eq!(put.value, 0.0);
    }
}
