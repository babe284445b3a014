//! The seam between the engine and the REST backend that stores sessions.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    ledger::Assignment,
    line_item::{ItemId, LineItem, Pass},
    quantity::Quantity,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// Operations the engine needs from the backend.
///
/// Writes must only report success once the value is stored: the engine
/// commits its in-memory state after a successful write and never before.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Line items of the (date, warehouse) session, in any order.
    async fn fetch_session(
        &self,
        date: NaiveDate,
        warehouse: &str,
    ) -> Result<Vec<LineItem>, BackendError>;

    /// Stores (or clears, with `None`) the count of one pass.
    async fn write_count(
        &self,
        item_id: ItemId,
        pass: Pass,
        value: Option<Quantity>,
    ) -> Result<(), BackendError>;

    async fn write_note(&self, item_id: ItemId, text: &str) -> Result<(), BackendError>;

    /// Names of the people discrepancies can be assigned to.
    async fn fetch_personnel(&self) -> Result<Vec<String>, BackendError>;

    async fn fetch_ledger(
        &self,
        date: NaiveDate,
        warehouse: &str,
    ) -> Result<HashMap<ItemId, Vec<Assignment>>, BackendError>;

    /// Replaces the whole assignment set of one item.
    async fn write_assignments(
        &self,
        item_id: ItemId,
        rows: &[Assignment],
    ) -> Result<(), BackendError>;
}
