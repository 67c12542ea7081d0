//! Type-safe money amounts using decimal arithmetic.
//!
//! All amounts are in the shop's single currency (the storefront sells in one
//! currency, so no currency code travels with the amount). Values are kept at
//! [`Money::SCALE`] decimal places; anything finer is rounded half away from
//! zero.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::quantity::Quantity;

/// A monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places amounts are rounded to.
    pub const SCALE: u32 = 2;

    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rounding to [`Money::SCALE`] places.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Create an amount from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: Quantity) -> Self {
        Self::new(self.0 * Decimal::from(quantity.get()))
    }

    /// `rate` percent of this amount, rounded to [`Money::SCALE`] places.
    #[must_use]
    pub fn percent(self, rate: Decimal) -> Self {
        Self::new(self.0 * rate / Decimal::ONE_HUNDRED)
    }

    /// Subtraction that never goes below zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_times() {
        assert_eq!(Money::from_units(150_000).times(qty(2)), Money::from_units(300_000));
    }

    #[test]
    fn test_percent_rounds_half_away_from_zero() {
        let amount = Money::new(Decimal::new(1005, 2)); // 10.05
        assert_eq!(amount.percent(Decimal::from(50)), Money::new(Decimal::new(503, 2)));
        assert_eq!(
            Money::from_units(300_000).percent(Decimal::from(10)),
            Money::from_units(30_000)
        );
    }

    #[test]
    fn test_saturating_sub() {
        let a = Money::from_units(10);
        let b = Money::from_units(25);
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a), Money::from_units(15));
    }

    #[test]
    fn test_sum_and_display() {
        let total: Money = [Money::from_units(1), Money::from_units(2)].into_iter().sum();
        assert_eq!(total.to_string(), "3.00");
        assert!(!Money::ZERO.is_negative());
        assert!((Money::ZERO - Money::from_units(1)).is_negative());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_units(25_000)).unwrap();
        assert_eq!(json, "\"25000\"");
    }
}
