use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::quantity::{MAGNITUDE_LIMIT, Quantity};

/// Monetary amount (unit costs and discrepancy valuations).
///
/// Values are kept exact; rounding to cents happens only when displayed.
///
/// # Examples
///
/// ```rust
/// use engine::{Money, Quantity};
///
/// let cost: Money = Money::new(125, 2);
/// let value = Money::of(Quantity::new(25, 1), cost);
/// assert_eq!(value.to_string(), "3.13");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    #[must_use]
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Self(Decimal::new(mantissa, scale))
    }

    #[must_use]
    pub const fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn decimal(self) -> Decimal {
        self.0
    }

    /// `quantity × unit_cost`.
    #[must_use]
    pub fn of(quantity: Quantity, unit_cost: Money) -> Self {
        Self(quantity.decimal() * unit_cost.0)
    }

    /// Whether `|self|` stays within [`MAGNITUDE_LIMIT`].
    #[must_use]
    pub fn in_range(self) -> bool {
        self.0.abs() <= Decimal::from(MAGNITUDE_LIMIT)
    }

    /// A zero unit cost means the backend has no cost data for the item.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Rounded to cents, half away from zero.
    #[must_use]
    pub fn cents(self) -> Decimal {
        self.0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.cents())
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_rounds_to_cents() {
        assert_eq!(Money::ZERO.to_string(), "0.00");
        assert_eq!(Money::new(1005, 3).to_string(), "1.01");
        assert_eq!(Money::new(-1005, 3).to_string(), "-1.01");
        assert_eq!(Money::new(42, 0).to_string(), "42.00");
    }

    #[test]
    fn range_is_bounded() {
        assert!(Money::new(1_000_000_000, 0).in_range());
        assert!(!Money::new(-1_000_000_001, 0).in_range());
        assert!(!Money::from(Decimal::MAX).in_range());
    }

    #[test]
    fn valuation_multiplies_exactly() {
        let value = Money::of(Quantity::new(2500, 3), Money::new(4, 1));
        assert_eq!(value, Money::from(Decimal::ONE));
    }
}
