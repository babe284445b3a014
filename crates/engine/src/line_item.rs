//! The module contains the representation of a counted product.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{money::Money, quantity::Quantity};

/// Label shown when the backend has no unit for a product.
pub const DEFAULT_UNIT: &str = "Unit";

/// Opaque identifier issued by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counting pass. The first pass covers every item, the second only the
/// items that disagreed with the system after the first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pass {
    First,
    Second,
}

impl Pass {
    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// One product of a counting session.
///
/// `first_count` and `second_count` distinguish "not counted" (`None`) from
/// a recorded zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: ItemId,
    pub code: String,
    pub name: String,
    pub unit: Option<String>,
    pub system_quantity: Quantity,
    pub first_count: Option<Quantity>,
    pub second_count: Option<Quantity>,
    pub notes: String,
    pub unit_cost: Money,
}

impl LineItem {
    pub fn new(
        id: ItemId,
        code: impl Into<String>,
        name: impl Into<String>,
        system_quantity: Quantity,
    ) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            unit: None,
            system_quantity,
            first_count: None,
            second_count: None,
            notes: String::new(),
            unit_cost: Money::ZERO,
        }
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn first_count(mut self, count: Quantity) -> Self {
        self.first_count = Some(count);
        self
    }

    #[must_use]
    pub fn second_count(mut self, count: Quantity) -> Self {
        self.second_count = Some(count);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[must_use]
    pub fn unit_cost(mut self, unit_cost: Money) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    pub fn unit_label(&self) -> &str {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_UNIT)
    }

    /// Case-insensitive substring match on code or name. Expects `needle`
    /// already lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.code.to_lowercase().contains(needle) || self.name.to_lowercase().contains(needle)
    }

    pub fn count(&self, pass: Pass) -> Option<Quantity> {
        match pass {
            Pass::First => self.first_count,
            Pass::Second => self.second_count,
        }
    }

    pub(crate) fn set_count(&mut self, pass: Pass, value: Option<Quantity>) {
        match pass {
            Pass::First => self.first_count = value,
            Pass::Second => self.second_count = value,
        }
    }

    /// Second count if present, else first count.
    pub fn final_count(&self) -> Option<Quantity> {
        self.second_count.or(self.first_count)
    }

    /// `final_count - system_quantity`, `None` while the item is uncounted.
    pub fn discrepancy(&self) -> Option<Quantity> {
        self.final_count().map(|count| count - self.system_quantity)
    }

    /// First field holding a value beyond [`MAGNITUDE_LIMIT`], if any.
    ///
    /// [`MAGNITUDE_LIMIT`]: crate::MAGNITUDE_LIMIT
    pub fn out_of_range(&self) -> Option<&'static str> {
        if !self.system_quantity.in_range() {
            return Some("system quantity");
        }
        if self.first_count.is_some_and(|count| !count.in_range()) {
            return Some("first count");
        }
        if self.second_count.is_some_and(|count| !count.in_range()) {
            return Some("second count");
        }
        if !self.unit_cost.in_range() {
            return Some("unit cost");
        }
        None
    }

    /// Whether the first count matches the system baseline exactly.
    pub fn first_count_matches(&self) -> Option<bool> {
        self.first_count.map(|count| count == self.system_quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> LineItem {
        LineItem::new(ItemId(1), "A01", "Cola", Quantity::from(10))
    }

    #[test]
    fn final_count_prefers_second_pass() {
        let item = item()
            .first_count(Quantity::from(8))
            .second_count(Quantity::from(9));
        assert_eq!(item.final_count(), Some(Quantity::from(9)));
        assert_eq!(item.discrepancy(), Some(Quantity::from(-1)));
    }

    #[test]
    fn zero_is_a_recorded_count() {
        let item = item().first_count(Quantity::ZERO);
        assert_eq!(item.final_count(), Some(Quantity::ZERO));
        assert_eq!(item.discrepancy(), Some(Quantity::from(-10)));
        assert_eq!(item.first_count_matches(), Some(false));
    }

    #[test]
    fn uncounted_item_has_no_discrepancy() {
        assert_eq!(item().discrepancy(), None);
        assert_eq!(item().first_count_matches(), None);
    }

    #[test]
    fn unit_label_defaults() {
        assert_eq!(item().unit_label(), DEFAULT_UNIT);
        assert_eq!(item().unit("  ").unit_label(), DEFAULT_UNIT);
        assert_eq!(item().unit("kg").unit_label(), "kg");
    }

    #[test]
    fn extreme_values_are_out_of_range() {
        use rust_decimal::Decimal;

        assert_eq!(item().out_of_range(), None);
        let huge = Quantity::from_decimal(Decimal::MAX);
        assert_eq!(item().second_count(huge).out_of_range(), Some("second count"));
        assert_eq!(
            item().unit_cost(Money::from(Decimal::MAX)).out_of_range(),
            Some("unit cost")
        );
    }
}
