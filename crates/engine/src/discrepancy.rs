use std::fmt;

use serde::Serialize;

use crate::{
    line_item::{ItemId, LineItem},
    money::Money,
    quantity::Quantity,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Counted less than the system expects.
    Shortage,
    /// Counted more than the system expects.
    Overage,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shortage => write!(f, "shortage"),
            Self::Overage => write!(f, "overage"),
        }
    }
}

/// A finalized line item whose final count differs from the system.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Discrepancy {
    pub item_id: ItemId,
    pub code: String,
    pub name: String,
    pub system_quantity: Quantity,
    pub final_count: Quantity,
    /// `final_count - system_quantity`, sign preserved.
    pub difference: Quantity,
    pub unit_cost: Money,
    pub notes: String,
}

impl Discrepancy {
    /// Builds the discrepancy of a counted item, `None` when it is uncounted
    /// or matches the system.
    pub fn of(item: &LineItem) -> Option<Self> {
        let final_count = item.final_count()?;
        let difference = final_count - item.system_quantity;
        if difference.is_zero() {
            return None;
        }
        Some(Self {
            item_id: item.id,
            code: item.code.clone(),
            name: item.name.clone(),
            system_quantity: item.system_quantity,
            final_count,
            difference,
            unit_cost: item.unit_cost,
            notes: item.notes.clone(),
        })
    }

    pub fn kind(&self) -> DiscrepancyKind {
        if self.difference.is_negative() {
            DiscrepancyKind::Shortage
        } else {
            DiscrepancyKind::Overage
        }
    }

    /// `|difference|`, the quantity that must be assigned to personnel.
    pub fn magnitude(&self) -> Quantity {
        self.difference.abs()
    }

    /// `|difference| × unit_cost`.
    pub fn value(&self) -> Money {
        Money::of(self.magnitude(), self.unit_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortage_is_valued_by_magnitude() {
        let item = LineItem::new(ItemId(3), "B02", "Beef", Quantity::from(10))
            .first_count(Quantity::from(9))
            .second_count(Quantity::new(75, 1))
            .unit_cost(Money::new(4, 0));

        let d = Discrepancy::of(&item).unwrap();
        assert_eq!(d.kind(), DiscrepancyKind::Shortage);
        assert_eq!(d.difference, Quantity::new(-25, 1));
        assert_eq!(d.magnitude(), Quantity::new(25, 1));
        assert_eq!(d.value(), Money::new(10, 0));
    }

    #[test]
    fn matching_or_uncounted_items_have_none() {
        let matching =
            LineItem::new(ItemId(1), "A", "A", Quantity::from(2)).first_count(Quantity::from(2));
        let uncounted = LineItem::new(ItemId(2), "B", "B", Quantity::from(2));
        assert!(Discrepancy::of(&matching).is_none());
        assert!(Discrepancy::of(&uncounted).is_none());
    }
}
