//! The module contains the discrepancy-to-person assignment ledger.
//!
//! Every finalized item with a nonzero discrepancy owns a list of
//! `(person, quantity)` rows. Rows can be edited freely in memory, but a
//! set is only persisted when its quantities add up to the magnitude of
//! the discrepancy.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    ResultEngine,
    discrepancy::Discrepancy,
    error::{EngineError, Violation},
    line_item::ItemId,
    money::Money,
    quantity::Quantity,
};

/// Tolerance used when checking that assigned quantities cover a discrepancy.
pub const COMPLETION_EPSILON: Quantity = Quantity::from_decimal(Decimal::from_parts(1, 0, 0, false, 3));

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub person: String,
    pub quantity: Quantity,
}

impl Assignment {
    pub fn new(person: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            person: person.into(),
            quantity,
        }
    }

    /// Rows without a person or without a positive quantity are not filled
    /// in yet.
    pub fn is_filled(&self) -> bool {
        !self.person.trim().is_empty() && self.quantity.is_positive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Unassigned,
    Partial,
    Complete,
}

/// Result of a quantity edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clamped {
    /// The value actually stored in the row.
    pub quantity: Quantity,
    /// `true` when the requested value was reduced to the remaining bound.
    pub max_exceeded: bool,
}

#[derive(Clone, Debug)]
struct Entry {
    code: String,
    target: Quantity,
    unit_cost: Money,
    rows: Vec<Assignment>,
}

impl Entry {
    fn assigned(&self) -> Quantity {
        self.rows.iter().map(|row| row.quantity).sum()
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentLedger {
    personnel: BTreeSet<String>,
    entries: BTreeMap<ItemId, Entry>,
}

impl AssignmentLedger {
    /// Builds the ledger of a finalized session from its discrepancies, the
    /// allowed personnel and the rows the backend already holds.
    pub fn new(
        discrepancies: &[Discrepancy],
        personnel: impl IntoIterator<Item = String>,
        mut saved: HashMap<ItemId, Vec<Assignment>>,
    ) -> Self {
        let entries = discrepancies
            .iter()
            .map(|d| {
                let rows = saved.remove(&d.item_id).unwrap_or_default();
                let entry = Entry {
                    code: d.code.clone(),
                    target: d.magnitude(),
                    unit_cost: d.unit_cost,
                    rows,
                };
                (d.item_id, entry)
            })
            .collect();

        for item_id in saved.keys() {
            tracing::warn!(%item_id, "ignoring saved assignments of an item without discrepancy");
        }

        Self {
            personnel: personnel.into_iter().collect(),
            entries,
        }
    }

    pub fn personnel(&self) -> &BTreeSet<String> {
        &self.personnel
    }

    /// Item ids of every discrepant item, in id order.
    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.entries.keys().copied()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.entries.contains_key(&item_id)
    }

    fn entry(&self, item_id: ItemId) -> ResultEngine<&Entry> {
        self.entries
            .get(&item_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("assignments of item {item_id}")))
    }

    fn entry_mut(&mut self, item_id: ItemId) -> ResultEngine<&mut Entry> {
        self.entries
            .get_mut(&item_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("assignments of item {item_id}")))
    }

    fn row_mut(&mut self, item_id: ItemId, row: usize) -> ResultEngine<&mut Assignment> {
        self.entry_mut(item_id)?
            .rows
            .get_mut(row)
            .ok_or_else(|| EngineError::KeyNotFound(format!("row {row} of item {item_id}")))
    }

    pub fn rows(&self, item_id: ItemId) -> ResultEngine<&[Assignment]> {
        Ok(&self.entry(item_id)?.rows)
    }

    /// `|difference|` of the item.
    pub fn target(&self, item_id: ItemId) -> ResultEngine<Quantity> {
        Ok(self.entry(item_id)?.target)
    }

    /// Opens an item for editing; an item without rows gets one empty
    /// template row.
    pub fn expand(&mut self, item_id: ItemId) -> ResultEngine<&[Assignment]> {
        let entry = self.entry_mut(item_id)?;
        if entry.rows.is_empty() {
            entry.rows.push(Assignment::new(String::new(), Quantity::ZERO));
        }
        Ok(&entry.rows)
    }

    /// Appends an empty row and returns its index.
    pub fn add_row(&mut self, item_id: ItemId) -> ResultEngine<usize> {
        let entry = self.entry_mut(item_id)?;
        entry.rows.push(Assignment::new(String::new(), Quantity::ZERO));
        Ok(entry.rows.len() - 1)
    }

    pub fn remove_row(&mut self, item_id: ItemId, row: usize) -> ResultEngine<Assignment> {
        let entry = self.entry_mut(item_id)?;
        if row >= entry.rows.len() {
            return Err(EngineError::KeyNotFound(format!("row {row} of item {item_id}")));
        }
        Ok(entry.rows.remove(row))
    }

    pub fn set_person(&mut self, item_id: ItemId, row: usize, person: &str) -> ResultEngine<()> {
        self.row_mut(item_id, row)?.person = person.trim().to_string();
        Ok(())
    }

    /// Stores a row quantity, clamped to `max(0, |diff| - other rows)` so the
    /// running total never exceeds the discrepancy.
    pub fn set_quantity(
        &mut self,
        item_id: ItemId,
        row: usize,
        value: Quantity,
    ) -> ResultEngine<Clamped> {
        let entry = self.entry(item_id)?;
        if row >= entry.rows.len() {
            return Err(EngineError::KeyNotFound(format!("row {row} of item {item_id}")));
        }
        let others: Quantity = entry
            .rows
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != row)
            .map(|(_, r)| r.quantity)
            .sum();
        let bound = (entry.target - others).max(Quantity::ZERO);

        let clamped = if value > bound {
            Clamped {
                quantity: bound,
                max_exceeded: true,
            }
        } else {
            Clamped {
                quantity: value.max(Quantity::ZERO),
                max_exceeded: false,
            }
        };
        if clamped.max_exceeded {
            tracing::debug!(%item_id, row, requested = %value, stored = %bound, "row quantity clamped");
        }

        self.row_mut(item_id, row)?.quantity = clamped.quantity;
        Ok(clamped)
    }

    /// Sum of every row quantity of the item.
    pub fn assigned(&self, item_id: ItemId) -> ResultEngine<Quantity> {
        Ok(self.entry(item_id)?.assigned())
    }

    /// What is left to assign, never negative.
    pub fn remaining(&self, item_id: ItemId) -> ResultEngine<Quantity> {
        let entry = self.entry(item_id)?;
        Ok((entry.target - entry.assigned()).max(Quantity::ZERO))
    }

    pub fn status(&self, item_id: ItemId) -> ResultEngine<AssignmentStatus> {
        let entry = self.entry(item_id)?;
        if entry.rows.iter().all(|row| row.quantity.is_zero()) {
            return Ok(AssignmentStatus::Unassigned);
        }
        if entry.assigned().within(entry.target, COMPLETION_EPSILON) {
            return Ok(AssignmentStatus::Complete);
        }
        Ok(AssignmentStatus::Partial)
    }

    /// Filters out unfilled rows and validates what is left. The returned rows
    /// are exactly what must be written to the backend.
    pub fn prepare_save(&self, item_id: ItemId) -> ResultEngine<Vec<Assignment>> {
        let entry = self.entry(item_id)?;
        let rows: Vec<Assignment> = entry
            .rows
            .iter()
            .filter(|row| row.is_filled())
            .map(|row| Assignment::new(row.person.trim(), row.quantity))
            .collect();

        if let Some(row) = rows.iter().find(|row| !self.personnel.contains(&row.person)) {
            return Err(Violation::UnknownPerson(row.person.clone()).into());
        }

        let mut seen = BTreeSet::new();
        if let Some(row) = rows.iter().find(|row| !seen.insert(row.person.as_str())) {
            return Err(Violation::DuplicatePerson(row.person.clone()).into());
        }

        let assigned: Quantity = rows.iter().map(|row| row.quantity).sum();
        if !assigned.within(entry.target, COMPLETION_EPSILON) {
            return Err(Violation::IncompleteAssignment {
                code: entry.code.clone(),
                expected: entry.target,
                assigned,
            }
            .into());
        }

        Ok(rows)
    }

    /// Replaces the rows of an item with what the backend confirmed.
    pub fn commit(&mut self, item_id: ItemId, rows: Vec<Assignment>) -> ResultEngine<()> {
        self.entry_mut(item_id)?.rows = rows;
        Ok(())
    }

    /// Items with at least one row holding a nonzero quantity.
    pub fn pending_items(&self) -> Vec<ItemId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.rows.iter().any(|row| !row.quantity.is_zero()))
            .map(|(item_id, _)| *item_id)
            .collect()
    }

    pub fn code(&self, item_id: ItemId) -> ResultEngine<&str> {
        Ok(&self.entry(item_id)?.code)
    }

    pub fn row_value(&self, item_id: ItemId, row: usize) -> ResultEngine<Money> {
        let entry = self.entry(item_id)?;
        let row = entry
            .rows
            .get(row)
            .ok_or_else(|| EngineError::KeyNotFound(format!("row {row} of item {item_id}")))?;
        Ok(Money::of(row.quantity, entry.unit_cost))
    }

    /// Value of what has been assigned so far.
    pub fn item_value(&self, item_id: ItemId) -> ResultEngine<Money> {
        let entry = self.entry(item_id)?;
        Ok(Money::of(entry.assigned(), entry.unit_cost))
    }

    /// Value of every discrepancy, independent of assignment completeness.
    pub fn total_value(&self) -> Money {
        self.entries
            .values()
            .map(|entry| Money::of(entry.target, entry.unit_cost))
            .sum()
    }
}
