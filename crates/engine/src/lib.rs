//! Two-pass physical inventory reconciliation.
//!
//! A counting session is the list of products of one warehouse on one date.
//! Counters first count every product; products that disagree with the
//! system quantity are counted a second time; the session is then finalized
//! and each remaining discrepancy can be annotated and assigned to staff.
//!
//! [`Session`] and [`AssignmentLedger`] are pure state. [`Engine`] drives
//! them against a [`Backend`], committing in-memory state only after the
//! backend has confirmed each write.

pub use backend::{Backend, BackendError};
pub use discrepancy::{Discrepancy, DiscrepancyKind};
pub use error::{EngineError, Violation};
pub use ledger::{Assignment, AssignmentLedger, AssignmentStatus, COMPLETION_EPSILON, Clamped};
pub use line_item::{DEFAULT_UNIT, ItemId, LineItem, Pass};
pub use money::Money;
pub use ops::{BatchOutcome, DEFAULT_TIMEOUT, Engine, EngineBuilder, WriteOutcome};
pub use quantity::{MAGNITUDE_LIMIT, Quantity};
pub use session::{CountChange, NoteChange, Progress, Session, Stage, derive_stage};

mod backend;
mod discrepancy;
mod error;
mod ledger;
mod line_item;
mod money;
mod ops;
mod quantity;
mod session;

type ResultEngine<T> = Result<T, EngineError>;
