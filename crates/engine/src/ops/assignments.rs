use futures::future::join_all;

use super::{BatchOutcome, Engine, bounded};
use crate::{
    Assignment, AssignmentLedger, AssignmentStatus, Backend, Clamped, EngineError, ItemId,
    Quantity, ResultEngine,
};

impl<B: Backend> Engine<B> {
    /// The ledger of the open session; only finalized sessions have one.
    pub fn ledger(&self) -> ResultEngine<&AssignmentLedger> {
        self.session()?;
        self.ledger.as_ref().ok_or_else(not_finalized)
    }

    fn ledger_mut(&mut self) -> ResultEngine<&mut AssignmentLedger> {
        self.session()?;
        self.ledger.as_mut().ok_or_else(not_finalized)
    }

    pub fn expand_assignment(&mut self, item_id: ItemId) -> ResultEngine<&[Assignment]> {
        self.ledger_mut()?.expand(item_id)
    }

    pub fn add_assignment_row(&mut self, item_id: ItemId) -> ResultEngine<usize> {
        self.ledger_mut()?.add_row(item_id)
    }

    pub fn remove_assignment_row(&mut self, item_id: ItemId, row: usize) -> ResultEngine<Assignment> {
        self.ledger_mut()?.remove_row(item_id, row)
    }

    pub fn set_assignment_person(
        &mut self,
        item_id: ItemId,
        row: usize,
        person: &str,
    ) -> ResultEngine<()> {
        self.ledger_mut()?.set_person(item_id, row, person)
    }

    /// See [`AssignmentLedger::set_quantity`]; `max_exceeded` tells the
    /// caller the value was reduced.
    pub fn set_assignment_quantity(
        &mut self,
        item_id: ItemId,
        row: usize,
        quantity: Quantity,
    ) -> ResultEngine<Clamped> {
        self.ledger_mut()?.set_quantity(item_id, row, quantity)
    }

    pub fn assignment_status(&self, item_id: ItemId) -> ResultEngine<AssignmentStatus> {
        self.ledger()?.status(item_id)
    }

    /// Validates and persists the assignment set of one item. On success the
    /// in-memory rows become exactly the rows that were written.
    pub async fn save_assignments(&mut self, item_id: ItemId) -> ResultEngine<()> {
        let rows = self.ledger()?.prepare_save(item_id)?;

        bounded(
            self.timeout,
            "assignment write",
            self.backend.write_assignments(item_id, &rows),
        )
        .await?;

        self.ledger_mut()?.commit(item_id, rows)?;
        tracing::debug!(%item_id, "assignments saved");
        Ok(())
    }

    /// Saves every item that has at least one nonzero row, independently.
    /// Incomplete items are counted as failures and do not stop the others.
    pub async fn save_all_assignments(&mut self) -> ResultEngine<BatchOutcome> {
        let ledger = self.ledger()?;
        let mut outcome = BatchOutcome::default();
        let mut ready = Vec::new();

        for item_id in ledger.pending_items() {
            match ledger.prepare_save(item_id) {
                Ok(rows) => ready.push((item_id, rows)),
                Err(err) => outcome.failures.push((item_id, err)),
            }
        }

        let backend = &self.backend;
        let timeout = self.timeout;
        let results = join_all(ready.iter().map(|(item_id, rows)| {
            bounded(
                timeout,
                "assignment write",
                backend.write_assignments(*item_id, rows),
            )
        }))
        .await;

        let ledger = self.ledger_mut()?;
        for ((item_id, rows), result) in ready.into_iter().zip(results) {
            match result.and_then(|()| ledger.commit(item_id, rows)) {
                Ok(()) => outcome.saved += 1,
                Err(err) => outcome.failures.push((item_id, err)),
            }
        }

        tracing::info!(
            saved = outcome.saved,
            failed = outcome.failed(),
            "assignments saved in bulk"
        );
        Ok(outcome)
    }
}

fn not_finalized() -> EngineError {
    EngineError::InvalidStage(
        "assignments are only available once the session is finalized".to_string(),
    )
}
