//! The module contains the two-pass reconciliation state machine.
//!
//! A [`Session`] is the set of line items counted for one (date, warehouse)
//! pair. Its [`Stage`] is never stored: it is derived from which count
//! fields are populated when the session is loaded, and then advanced
//! explicitly by the counter.
//!
//! ```text
//! FirstCount ──advance──▶ SecondCount ──advance──▶ Finalized
//!      │                                              ▲
//!      └──────── advance (every first count matches) ─┘
//! ```
use std::{collections::BTreeSet, fmt};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    ResultEngine,
    discrepancy::Discrepancy,
    error::{EngineError, Violation},
    line_item::{ItemId, LineItem, Pass},
    money::Money,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    FirstCount,
    SecondCount,
    Finalized,
}

impl Stage {
    pub fn number(self) -> u8 {
        match self {
            Self::FirstCount => 1,
            Self::SecondCount => 2,
            Self::Finalized => 3,
        }
    }

    /// The pass whose counts may be edited in this stage.
    pub fn active_pass(self) -> Option<Pass> {
        match self {
            Self::FirstCount => Some(Pass::First),
            Self::SecondCount => Some(Pass::Second),
            Self::Finalized => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstCount => write!(f, "first count"),
            Self::SecondCount => write!(f, "second count"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Counted versus total visible items for the pass in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub recorded: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(self) -> bool {
        self.recorded == self.total
    }
}

/// A count write the backend must confirm before it is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct CountChange {
    pub item_id: ItemId,
    pub pass: Pass,
    pub value: Option<crate::Quantity>,
}

/// A note write the backend must confirm before it is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteChange {
    pub item_id: ItemId,
    pub text: String,
}

/// Derives the stage and the failed set from the count fields.
///
/// 1. Any second count present: the session was already finalized; the
///    failed set is every item with a second count.
/// 2. Every first count present: the failed set is every item whose first
///    count differs from the system; an empty failed set means finalized.
/// 3. Otherwise the first count is still in progress.
pub fn derive_stage(items: &[LineItem]) -> (Stage, BTreeSet<String>) {
    if items.iter().any(|item| item.second_count.is_some()) {
        let failed = items
            .iter()
            .filter(|item| item.second_count.is_some())
            .map(|item| item.code.clone())
            .collect();
        return (Stage::Finalized, failed);
    }

    if items.iter().all(|item| item.first_count.is_some()) {
        let failed = first_pass_failures(items);
        let stage = if failed.is_empty() {
            Stage::Finalized
        } else {
            Stage::SecondCount
        };
        return (stage, failed);
    }

    (Stage::FirstCount, BTreeSet::new())
}

// Exact decimal equality: a first count is only "matching" when it equals the
// system quantity to the last digit.
fn first_pass_failures(items: &[LineItem]) -> BTreeSet<String> {
    items
        .iter()
        .filter(|item| item.first_count_matches() == Some(false))
        .map(|item| item.code.clone())
        .collect()
}

#[derive(Clone, Debug)]
pub struct Session {
    date: NaiveDate,
    warehouse: String,
    items: Vec<LineItem>,
    stage: Stage,
    failed: BTreeSet<String>,
}

impl Session {
    /// Builds a session from a freshly fetched collection and derives its
    /// stage. Items are kept sorted by code.
    pub fn load(
        date: NaiveDate,
        warehouse: impl Into<String>,
        mut items: Vec<LineItem>,
    ) -> ResultEngine<Self> {
        if items.is_empty() {
            return Err(Violation::EmptySession.into());
        }

        items.sort_by(|a, b| a.code.cmp(&b.code));
        if let Some(pair) = items.windows(2).find(|pair| pair[0].code == pair[1].code) {
            return Err(Violation::DuplicateCode(pair[0].code.clone()).into());
        }

        let (stage, failed) = derive_stage(&items);
        let warehouse = warehouse.into();
        tracing::info!(
            %date,
            warehouse = %warehouse,
            items = items.len(),
            failed = failed.len(),
            "session loaded in stage {stage}"
        );

        Ok(Self {
            date,
            warehouse,
            items,
            stage,
            failed,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn warehouse(&self) -> &str {
        &self.warehouse
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Codes carried from the first pass into the second.
    pub fn failed_codes(&self) -> &BTreeSet<String> {
        &self.failed
    }

    /// Every item, sorted by code.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn item(&self, item_id: ItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_by_code(&self, code: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.code == code)
    }

    fn item_mut(&mut self, item_id: ItemId) -> ResultEngine<&mut LineItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("item {item_id}")))
    }

    fn existing(&self, item_id: ItemId) -> ResultEngine<&LineItem> {
        self.item(item_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("item {item_id}")))
    }

    /// The second pass is a focused recount: only failed items are shown.
    pub fn visible_items(&self) -> Vec<&LineItem> {
        match self.stage {
            Stage::SecondCount => self
                .items
                .iter()
                .filter(|item| self.failed.contains(&item.code))
                .collect(),
            Stage::FirstCount | Stage::Finalized => self.items.iter().collect(),
        }
    }

    /// Visible items whose code or name contains `query`, ignoring case. A
    /// blank query returns every visible item.
    pub fn search(&self, query: &str) -> Vec<&LineItem> {
        let needle = query.trim().to_lowercase();
        self.visible_items()
            .into_iter()
            .filter(|item| item.matches(&needle))
            .collect()
    }

    pub fn progress(&self) -> Progress {
        let visible = self.visible_items();
        let recorded = visible
            .iter()
            .filter(|item| match self.stage.active_pass() {
                Some(pass) => item.count(pass).is_some(),
                None => item.final_count().is_some(),
            })
            .count();
        Progress {
            recorded,
            total: visible.len(),
        }
    }

    /// Checks a count edit against the current stage.
    ///
    /// Returns `Ok(None)` when `value` equals what is already stored, so no
    /// write has to be issued.
    pub fn count_change(
        &self,
        item_id: ItemId,
        pass: Pass,
        value: Option<crate::Quantity>,
    ) -> ResultEngine<Option<CountChange>> {
        let item = self.existing(item_id)?;
        if value.is_some_and(|value| !value.in_range()) {
            return Err(Violation::InvalidQuantity("quantity too large".to_string()).into());
        }

        match (self.stage, pass) {
            (Stage::FirstCount, Pass::First) => {}
            (Stage::SecondCount, Pass::Second) => {
                if !self.failed.contains(&item.code) {
                    return Err(EngineError::InvalidStage(format!(
                        "{} is not part of the second count",
                        item.code
                    )));
                }
            }
            (Stage::Finalized, _) => {
                return Err(EngineError::InvalidStage(
                    "the session is finalized; counts are read-only".to_string(),
                ));
            }
            (stage, pass) => {
                return Err(EngineError::InvalidStage(format!(
                    "count {pass} cannot be recorded during the {stage}"
                )));
            }
        }

        if item.count(pass) == value {
            tracing::debug!(%item_id, %pass, "count unchanged, no write needed");
            return Ok(None);
        }

        Ok(Some(CountChange {
            item_id,
            pass,
            value,
        }))
    }

    /// Commits a count the backend has confirmed.
    pub fn apply_count(&mut self, change: &CountChange) -> ResultEngine<()> {
        let item = self.item_mut(change.item_id)?;
        item.set_count(change.pass, change.value);
        Ok(())
    }

    /// Moves the session to its next stage.
    ///
    /// From the first count every item must be counted; items whose count
    /// differs from the system form the failed set. From the second count
    /// every failed item must have a second count; originally matching items
    /// are not re-checked.
    pub fn advance_stage(&mut self) -> ResultEngine<Stage> {
        let next = match self.stage {
            Stage::FirstCount => {
                let missing = self.missing_codes(Pass::First, |_| true);
                if !missing.is_empty() {
                    return Err(Violation::MissingCounts {
                        pass: Pass::First,
                        codes: missing,
                    }
                    .into());
                }

                self.failed = first_pass_failures(&self.items);
                if self.failed.is_empty() {
                    Stage::Finalized
                } else {
                    Stage::SecondCount
                }
            }
            Stage::SecondCount => {
                let failed = &self.failed;
                let missing = self.missing_codes(Pass::Second, |item| failed.contains(&item.code));
                if !missing.is_empty() {
                    return Err(Violation::MissingCounts {
                        pass: Pass::Second,
                        codes: missing,
                    }
                    .into());
                }
                Stage::Finalized
            }
            Stage::Finalized => {
                return Err(EngineError::InvalidStage(
                    "the session is already finalized".to_string(),
                ));
            }
        };

        tracing::info!(
            warehouse = %self.warehouse,
            date = %self.date,
            failed = self.failed.len(),
            "stage {} -> {next}",
            self.stage
        );
        self.stage = next;
        Ok(next)
    }

    fn missing_codes(&self, pass: Pass, scope: impl Fn(&LineItem) -> bool) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| scope(item) && item.count(pass).is_none())
            .map(|item| item.code.clone())
            .collect()
    }

    /// Checks a note edit. Notes belong to finalized items with a nonzero
    /// discrepancy; the text is trimmed.
    pub fn note_change(&self, item_id: ItemId, text: &str) -> ResultEngine<Option<NoteChange>> {
        if self.stage != Stage::Finalized {
            return Err(EngineError::InvalidStage(
                "notes can only be written once the session is finalized".to_string(),
            ));
        }
        let item = self.existing(item_id)?;
        if Discrepancy::of(item).is_none() {
            return Err(Violation::NotDiscrepant(item.code.clone()).into());
        }

        let text = text.trim();
        if item.notes == text {
            return Ok(None);
        }
        Ok(Some(NoteChange {
            item_id,
            text: text.to_string(),
        }))
    }

    pub fn apply_note(&mut self, change: &NoteChange) -> ResultEngine<()> {
        let item = self.item_mut(change.item_id)?;
        item.notes = change.text.clone();
        Ok(())
    }

    /// Items with a nonzero final difference; empty before finalization.
    pub fn discrepancies(&self) -> Vec<Discrepancy> {
        if self.stage != Stage::Finalized {
            return Vec::new();
        }
        self.items.iter().filter_map(Discrepancy::of).collect()
    }

    pub fn discrepancy(&self, item_id: ItemId) -> Option<Discrepancy> {
        if self.stage != Stage::Finalized {
            return None;
        }
        self.item(item_id).and_then(Discrepancy::of)
    }

    /// `Σ |difference| × unit_cost` over every discrepant item, regardless of
    /// how much of it has been assigned.
    pub fn total_value(&self) -> Money {
        self.discrepancies().iter().map(Discrepancy::value).sum()
    }
}
