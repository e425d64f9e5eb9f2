//! Date type for term structures and instruments.

use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

use crate::error::{QuantResult, QuantwireError};

/// Days per year under Actual/365 Fixed.
const DAYS_PER_YEAR: f64 = 365.0;

/// A calendar date.
///
/// Newtype over `chrono::NaiveDate`. Calendars and day-count conventions
/// live outside this crate; [`Date::year_fraction`] uses Actual/365 Fixed.
///
/// # Example
///
/// ```rust
/// use quantwire_core::Date;
///
/// let date = Date::from_ymd(2025, 6, 15).unwrap();
/// let later = date.add_months(6).unwrap();
/// assert_eq!(later.month(), 12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a new date from year, month, and day.
    ///
    /// # Errors
    ///
    /// Returns `QuantwireError::InvalidInput` if the date is invalid.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> QuantResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or_else(|| {
                QuantwireError::invalid_input(format!("invalid date {year}-{month:02}-{day:02}"))
            })
    }

    /// Creates a date from an ISO 8601 string (YYYY-MM-DD).
    ///
    /// # Errors
    ///
    /// Returns `QuantwireError::InvalidInput` if the string is not a valid date.
    pub fn parse(s: &str) -> QuantResult<Self> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Date)
            .map_err(|_| QuantwireError::invalid_input(format!("cannot parse date: {s}")))
    }

    /// Returns the year component.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day component (1-31).
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Adds a number of days to the date.
    ///
    /// # Errors
    ///
    /// Returns `QuantwireError::InvalidInput` if the result is out of range.
    pub fn add_days(&self, days: i64) -> QuantResult<Self> {
        TimeDelta::try_days(days)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Date)
            .ok_or_else(|| out_of_range(self, days, "days"))
    }

    /// Adds a number of months, clamping to the last day of the target month.
    ///
    /// # Errors
    ///
    /// Returns `QuantwireError::InvalidInput` if the result is out of range.
    pub fn add_months(&self, months: i32) -> QuantResult<Self> {
        let shifted = if months >= 0 {
            self.0.checked_add_months(Months::new(months.unsigned_abs()))
        } else {
            self.0.checked_sub_months(Months::new(months.unsigned_abs()))
        };
        shifted
            .map(Date)
            .ok_or_else(|| out_of_range(self, i64::from(months), "months"))
    }

    /// Calculates the number of calendar days from `self` to `other`.
    pub fn days_between(&self, other: &Date) -> i64 {
        (other.0 - self.0).num_days()
    }

    /// Actual/365 Fixed year fraction from `start` to `end`.
    ///
    /// Negative when `end` precedes `start`.
    pub fn year_fraction(start: Date, end: Date) -> f64 {
        start.days_between(&end) as f64 / DAYS_PER_YEAR
    }

    /// Returns the underlying `NaiveDate`.
    pub fn as_naive_date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for Date {
    fn from(date: NaiveDate) -> Self {
        Date(date)
    }
}

impl Sub<Date> for Date {
    type Output = i64;

    fn sub(self, other: Date) -> Self::Output {
        other.days_between(&self)
    }
}

fn out_of_range(date: &Date, amount: i64, unit: &str) -> QuantwireError {
    QuantwireError::invalid_input(format!("{date} plus {amount} {unit} is out of range"))
}
