//! Caps, floors and collars on a floating leg.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use quantwire_core::{Date, Handle, Observable, QuantResult, QuantwireError};

use crate::engine::{Arguments, ArgumentsKind};
use crate::instrument::{downcast_arguments, Instrument, InstrumentTerms};
use crate::termstructure::YieldTermStructure;

/// Cap, floor or collar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapFloorType {
    /// Strip of caplets.
    Cap,
    /// Strip of floorlets.
    Floor,
    /// Long cap, short floor.
    Collar,
}

impl CapFloorType {
    fn has_cap(&self) -> bool {
        matches!(self, CapFloorType::Cap | CapFloorType::Collar)
    }

    fn has_floor(&self) -> bool {
        matches!(self, CapFloorType::Floor | CapFloorType::Collar)
    }
}

impl fmt::Display for CapFloorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapFloorType::Cap => write!(f, "Cap"),
            CapFloorType::Floor => write!(f, "Floor"),
            CapFloorType::Collar => write!(f, "Collar"),
        }
    }
}

/// A coupon paying `gearing * index + spread` on `nominal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatingRateCoupon {
    /// Index fixing date.
    pub fixing_date: Date,
    /// Start of the accrual period.
    pub accrual_start: Date,
    /// End of the accrual period.
    pub accrual_end: Date,
    /// Payment date.
    pub payment_date: Date,
    /// Notional.
    pub nominal: f64,
    /// Multiplier applied to the index.
    pub gearing: f64,
    /// Spread over the geared index.
    pub spread: f64,
}

impl FloatingRateCoupon {
    /// Coupon fixing at accrual start and paying at accrual end.
    pub fn new(accrual_start: Date, accrual_end: Date, nominal: f64) -> Self {
        Self {
            fixing_date: accrual_start,
            accrual_start,
            accrual_end,
            payment_date: accrual_end,
            nominal,
            gearing: 1.0,
            spread: 0.0,
        }
    }

    /// Sets gearing and spread.
    pub fn with_gearing_and_spread(mut self, gearing: f64, spread: f64) -> Self {
        self.gearing = gearing;
        self.spread = spread;
        self
    }

    /// Act/365F accrual period.
    pub fn accrual_period(&self) -> f64 {
        Date::year_fraction(self.accrual_start, self.accrual_end)
    }

    /// Forward index rate projected off `curve`.
    pub fn index_forward(&self, curve: &dyn YieldTermStructure) -> QuantResult<f64> {
        curve.forward_rate(self.accrual_start, self.accrual_end)
    }

    /// Projected coupon rate `gearing * forward + spread`.
    pub fn adjusted_rate(&self, curve: &dyn YieldTermStructure) -> QuantResult<f64> {
        Ok(self.gearing * self.index_forward(curve)? + self.spread)
    }
}

/// Engine inputs for a cap, floor or collar.
///
/// Times are Act/365F from the curve's reference date. Forwards and
/// discounts are absent for coupons already paid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapFloorArguments {
    /// Instrument type.
    pub cap_floor_type: Option<CapFloorType>,
    /// Accrual start times.
    pub start_times: Vec<f64>,
    /// Fixing dates.
    pub fixing_dates: Vec<Date>,
    /// Fixing times.
    pub fixing_times: Vec<f64>,
    /// Payment times.
    pub end_times: Vec<f64>,
    /// Accrual periods.
    pub accrual_times: Vec<f64>,
    /// Index-equivalent cap strikes.
    pub cap_rates: Vec<f64>,
    /// Index-equivalent floor strikes.
    pub floor_rates: Vec<f64>,
    /// Index forwards.
    pub forwards: Vec<Option<f64>>,
    /// Coupon gearings.
    pub gearings: Vec<f64>,
    /// Coupon spreads.
    pub spreads: Vec<f64>,
    /// Discount factors to payment.
    pub discounts: Vec<Option<f64>>,
    /// Coupon notionals.
    pub nominals: Vec<f64>,
}

impl CapFloorArguments {
    fn check_len(&self, what: &str, len: usize) -> QuantResult<()> {
        if len != self.start_times.len() {
            return Err(QuantwireError::invalid_input(format!(
                "number of start times ({}) different from that of {what} ({len})",
                self.start_times.len()
            )));
        }
        Ok(())
    }
}

impl Arguments for CapFloorArguments {
    fn kind(&self) -> ArgumentsKind {
        ArgumentsKind::CapFloor
    }

    fn validate(&self) -> QuantResult<()> {
        let kind = self
            .cap_floor_type
            .ok_or_else(|| QuantwireError::invalid_input("cap/floor type not set"))?;
        self.check_len("end times", self.end_times.len())?;
        self.check_len("accrual times", self.accrual_times.len())?;
        self.check_len("fixing times", self.fixing_times.len())?;
        if kind.has_cap() {
            self.check_len("cap rates", self.cap_rates.len())?;
        }
        if kind.has_floor() {
            self.check_len("floor rates", self.floor_rates.len())?;
        }
        self.check_len("gearings", self.gearings.len())?;
        self.check_len("nominals", self.nominals.len())?;
        self.check_len("forwards", self.forwards.len())?;
        self.check_len("discounts", self.discounts.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Terms of a cap, floor or collar.
#[derive(Debug, Clone)]
pub struct CapFloor {
    cap_floor_type: CapFloorType,
    leg: Vec<FloatingRateCoupon>,
    cap_rates: Vec<f64>,
    floor_rates: Vec<f64>,
    term_structure: Handle<dyn YieldTermStructure>,
    start_date: Date,
    maturity_date: Date,
    last_fixing_date: Date,
    last_payment_date: Date,
}

/// A cap, floor or collar priced by an engine.
pub type CapFloorInstrument = Instrument<CapFloor>;

fn pad_rates(mut rates: Vec<f64>, len: usize) -> Vec<f64> {
    if let Some(&last) = rates.last() {
        if rates.len() < len {
            rates.resize(len, last);
        }
    }
    rates
}

impl CapFloor {
    /// Creates the terms.
    ///
    /// Rates are padded with their last value to the leg length.
    ///
    /// # Errors
    ///
    /// Fails if the leg is empty, if rates required by the type are missing,
    /// or if a coupon has non-positive gearing.
    pub fn new(
        cap_floor_type: CapFloorType,
        leg: Vec<FloatingRateCoupon>,
        cap_rates: Vec<f64>,
        floor_rates: Vec<f64>,
        term_structure: Handle<dyn YieldTermStructure>,
    ) -> QuantResult<Self> {
        let (Some(first), Some(last)) = (leg.first().copied(), leg.last().copied()) else {
            return Err(QuantwireError::invalid_input("empty floating leg"));
        };
        if cap_floor_type.has_cap() && cap_rates.is_empty() {
            return Err(QuantwireError::invalid_input("no cap rates given"));
        }
        if cap_floor_type.has_floor() && floor_rates.is_empty() {
            return Err(QuantwireError::invalid_input("no floor rates given"));
        }
        if let Some(c) = leg.iter().find(|c| c.gearing <= 0.0) {
            return Err(QuantwireError::invalid_input(format!(
                "positive gearing required, coupon fixing on {} has {}",
                c.fixing_date, c.gearing
            )));
        }

        let n = leg.len();
        let (start_date, maturity_date, last_payment_date) = leg.iter().fold(
            (first.accrual_start, first.accrual_end, first.payment_date),
            |(start, end, paid), c| {
                (
                    start.min(c.accrual_start),
                    end.max(c.accrual_end),
                    paid.max(c.payment_date),
                )
            },
        );
        Ok(Self {
            cap_floor_type,
            cap_rates: pad_rates(cap_rates, n),
            floor_rates: pad_rates(floor_rates, n),
            leg,
            term_structure,
            start_date,
            maturity_date,
            last_fixing_date: last.fixing_date,
            last_payment_date,
        })
    }

    /// A cap.
    pub fn cap(
        leg: Vec<FloatingRateCoupon>,
        strikes: Vec<f64>,
        term_structure: Handle<dyn YieldTermStructure>,
    ) -> QuantResult<Self> {
        Self::new(CapFloorType::Cap, leg, strikes, Vec::new(), term_structure)
    }

    /// A floor.
    pub fn floor(
        leg: Vec<FloatingRateCoupon>,
        strikes: Vec<f64>,
        term_structure: Handle<dyn YieldTermStructure>,
    ) -> QuantResult<Self> {
        Self::new(CapFloorType::Floor, leg, Vec::new(), strikes, term_structure)
    }

    /// A collar.
    pub fn collar(
        leg: Vec<FloatingRateCoupon>,
        cap_rates: Vec<f64>,
        floor_rates: Vec<f64>,
        term_structure: Handle<dyn YieldTermStructure>,
    ) -> QuantResult<Self> {
        Self::new(
            CapFloorType::Collar,
            leg,
            cap_rates,
            floor_rates,
            term_structure,
        )
    }

    /// Instrument type.
    pub fn cap_floor_type(&self) -> CapFloorType {
        self.cap_floor_type
    }

    /// The floating leg.
    pub fn leg(&self) -> &[FloatingRateCoupon] {
        &self.leg
    }

    /// Cap strikes, padded to the leg length.
    pub fn cap_rates(&self) -> &[f64] {
        &self.cap_rates
    }

    /// Floor strikes, padded to the leg length.
    pub fn floor_rates(&self) -> &[f64] {
        &self.floor_rates
    }

    /// Earliest accrual start.
    pub fn start_date(&self) -> Date {
        self.start_date
    }

    /// Latest accrual end.
    pub fn maturity_date(&self) -> Date {
        self.maturity_date
    }

    /// Fixing date of the last coupon.
    pub fn last_fixing_date(&self) -> Date {
        self.last_fixing_date
    }

    /// Par rate of the floating leg: the discounted, accrual-weighted
    /// average of the coupon rates still to be paid.
    pub fn atm_rate(&self) -> QuantResult<f64> {
        let curve = self.term_structure.get_link()?;
        let reference = curve.reference_date()?;

        let (mut annuity, mut floating) = (0.0, 0.0);
        for coupon in self.leg.iter().filter(|c| c.payment_date > reference) {
            let weight = coupon.nominal * coupon.accrual_period() * curve.discount(coupon.payment_date)?;
            annuity += weight;
            floating += weight * coupon.adjusted_rate(curve.as_ref())?;
        }
        if annuity == 0.0 {
            return Err(QuantwireError::calculation(
                self.name(),
                "no coupons left to compute the ATM rate",
            ));
        }
        Ok(floating / annuity)
    }
}

impl InstrumentTerms for CapFloor {
    fn name(&self) -> String {
        format!(
            "{}({} to {})",
            self.cap_floor_type,
            self.start_date(),
            self.maturity_date()
        )
    }

    fn dependencies(&self) -> Vec<&dyn Observable> {
        vec![&self.term_structure]
    }

    fn arguments_kind(&self) -> ArgumentsKind {
        ArgumentsKind::CapFloor
    }

    fn is_expired(&self) -> QuantResult<bool> {
        let reference = self.term_structure.get_link()?.reference_date()?;
        Ok(self.last_payment_date <= reference)
    }

    fn setup_arguments(&self, arguments: &mut dyn Arguments) -> QuantResult<()> {
        let name = self.name();
        let arguments: &mut CapFloorArguments =
            downcast_arguments(&name, self.arguments_kind(), arguments)?;

        let curve = self.term_structure.get_link()?;
        let reference = curve.reference_date()?;
        let n = self.leg.len();
        let mut args = CapFloorArguments {
            cap_floor_type: Some(self.cap_floor_type),
            ..CapFloorArguments::default()
        };

        for (i, coupon) in self.leg.iter().enumerate() {
            args.start_times
                .push(Date::year_fraction(reference, coupon.accrual_start));
            args.fixing_dates.push(coupon.fixing_date);
            args.fixing_times
                .push(Date::year_fraction(reference, coupon.fixing_date));
            let end_time = Date::year_fraction(reference, coupon.payment_date);
            args.end_times.push(end_time);
            args.accrual_times.push(coupon.accrual_period());

            if end_time >= 0.0 {
                args.forwards.push(Some(coupon.index_forward(curve.as_ref())?));
                args.discounts.push(Some(curve.discount(coupon.payment_date)?));
            } else {
                args.forwards.push(None);
                args.discounts.push(None);
            }

            args.nominals.push(coupon.nominal);
            args.gearings.push(coupon.gearing);
            args.spreads.push(coupon.spread);
            if self.cap_floor_type.has_cap() {
                args.cap_rates
                    .push((self.cap_rates[i] - coupon.spread) / coupon.gearing);
            }
            if self.cap_floor_type.has_floor() {
                args.floor_rates
                    .push((self.floor_rates[i] - coupon.spread) / coupon.gearing);
            }
        }
        debug_assert_eq!(args.start_times.len(), n);

        *arguments = args;
        Ok(())
    }
}
