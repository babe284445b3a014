use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Violation};

/// Maximum fractional digits a counted quantity may carry.
pub const QUANTITY_SCALE: u32 = 3;

/// Largest magnitude accepted for a quantity or a unit cost. Keeps every
/// difference, valuation and session total far from the `Decimal` range.
pub const MAGNITUDE_LIMIT: i64 = 1_000_000_000;

/// Signed product quantity backed by an exact decimal.
///
/// Use this type for **all** quantities in the engine (system baseline,
/// counts, discrepancies, assigned portions) so that comparisons never
/// suffer floating-point drift.
///
/// The value is signed when it is a discrepancy:
/// - negative = shortage (counted less than the system expects)
/// - positive = overage
///
/// # Examples
///
/// ```rust
/// use engine::Quantity;
///
/// let counted: Quantity = "12,5".parse().unwrap();
/// let system: Quantity = "15".parse().unwrap();
/// assert_eq!((counted - system).signed(), "-2.500");
/// assert_eq!(counted.to_string(), "12.5");
/// assert!("1.2345".parse::<Quantity>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    /// Creates a quantity from an integer mantissa and a scale, e.g.
    /// `Quantity::new(25, 1)` is `2.5`.
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

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Whether `|self|` stays within [`MAGNITUDE_LIMIT`].
    #[must_use]
    pub fn in_range(self) -> bool {
        self.0.abs() <= Decimal::from(MAGNITUDE_LIMIT)
    }

    /// Returns `true` when `|self - other| < epsilon`.
    #[must_use]
    pub fn within(self, other: Quantity, epsilon: Quantity) -> bool {
        (self.0 - other.0).abs() < epsilon.0
    }

    /// Formats with exactly three decimals and an explicit `+` for positive
    /// values, the way differences are shown to counters.
    #[must_use]
    pub fn signed(self) -> String {
        let rounded = self.0.round_dp(QUANTITY_SCALE);
        if rounded > Decimal::ZERO {
            format!("+{rounded:.3}")
        } else if rounded.is_zero() {
            "0.000".to_string()
        } else {
            format!("{rounded:.3}")
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Self::Output {
        Quantity(self.0 + rhs.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Self::Output {
        Quantity(self.0 - rhs.0)
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        self.0 -= rhs.0;
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Self::Output {
        Quantity(-self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, |acc, q| acc + q)
    }
}

impl<'a> Sum<&'a Quantity> for Quantity {
    fn sum<I: Iterator<Item = &'a Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, |acc, q| acc + *q)
    }
}

impl FromStr for Quantity {
    type Err = EngineError;

    /// Parses user input into a quantity.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 3 fractional digits (rejects `1.2345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| EngineError::from(Violation::InvalidQuantity(reason.to_string()));

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty quantity"));
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim().replace(',', ".");
        let mut parts = rest.split('.');
        let int_part = parts.next().unwrap_or_default();
        let frac_part = parts.next();
        if parts.next().is_some() {
            return Err(invalid(trimmed));
        }

        if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(trimmed));
        }
        if let Some(frac) = frac_part {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid(trimmed));
            }
            if frac.len() > QUANTITY_SCALE as usize {
                return Err(invalid("too many decimals"));
            }
        }

        let value: Decimal = rest.trim_end_matches('.').parse().map_err(|_| invalid(trimmed))?;
        let quantity = Quantity(if negative { -value } else { value });
        if !quantity.in_range() {
            return Err(invalid("quantity too large"));
        }
        Ok(quantity)
    }
}
