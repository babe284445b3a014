//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when user input violates an invariant of the
//!   counting protocol or of the assignment ledger. In-memory state is left
//!   untouched.
//! - [`Persistence`] thrown when the backend rejects a write, cannot be
//!   reached or does not answer in time.
//! - [`KeyNotFound`], [`InvalidStage`] and [`NoSession`] are caller errors:
//!   the operation is not available for the current state.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Persistence`]: EngineError::Persistence
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`InvalidStage`]: EngineError::InvalidStage
//!  [`NoSession`]: EngineError::NoSession
use thiserror::Error;

use crate::{
    backend::BackendError,
    line_item::Pass,
    quantity::Quantity,
};

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(Violation),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("operation not allowed: {0}")]
    InvalidStage(String),
    #[error("no session is open")]
    NoSession,
}

impl EngineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// The invariant a refused operation would have broken.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("{} item(s) still without count {pass}: {}", codes.len(), codes.join(", "))]
    MissingCounts { pass: Pass, codes: Vec<String> },
    #[error("{code}: assigned {assigned} of {expected}")]
    IncompleteAssignment {
        code: String,
        expected: Quantity,
        assigned: Quantity,
    },
    #[error("\"{0}\" is not in the personnel list")]
    UnknownPerson(String),
    #[error("\"{0}\" appears more than once")]
    DuplicatePerson(String),
    #[error("no line items for this date and warehouse")]
    EmptySession,
    #[error("code \"{0}\" appears more than once")]
    DuplicateCode(String),
    #[error("{0} has no discrepancy")]
    NotDiscrepant(String),
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
}

impl From<Violation> for EngineError {
    fn from(value: Violation) -> Self {
        Self::Validation(value)
    }
}

impl From<BackendError> for EngineError {
    fn from(value: BackendError) -> Self {
        Self::Persistence(value.to_string())
    }
}
