use futures::future::join_all;

use super::{BatchOutcome, Engine, WriteOutcome, bounded};
use crate::{Backend, EngineError, ItemId, Pass, Quantity, ResultEngine};

impl<B: Backend> Engine<B> {
    /// Records the count of one pass for one item.
    ///
    /// `None` clears the count; `Some(Quantity::ZERO)` is a real count. A
    /// value equal to the stored one issues no write. The session is only
    /// updated once the backend confirms, so a failed write leaves the item
    /// untouched for the caller to flag and retry.
    pub async fn record_count(
        &mut self,
        item_id: ItemId,
        pass: Pass,
        value: Option<Quantity>,
    ) -> ResultEngine<WriteOutcome> {
        let Some(change) = self.session()?.count_change(item_id, pass, value)? else {
            return Ok(WriteOutcome::Unchanged);
        };

        bounded(
            self.timeout,
            "count write",
            self.backend.write_count(item_id, pass, value),
        )
        .await?;

        self.session_mut()?.apply_count(&change)?;
        tracing::debug!(%item_id, %pass, "count saved");
        Ok(WriteOutcome::Saved)
    }

    /// Records several counts at once, e.g. every pending input before the
    /// stage is advanced.
    ///
    /// Changed values are written concurrently; each confirmed value is
    /// committed on its own and failures do not stop the others.
    pub async fn record_counts(
        &mut self,
        entries: impl IntoIterator<Item = (ItemId, Pass, Option<Quantity>)>,
    ) -> ResultEngine<BatchOutcome> {
        let session = self.session()?;
        let mut outcome = BatchOutcome::default();
        let mut changes = Vec::new();

        for (item_id, pass, value) in entries {
            match session.count_change(item_id, pass, value) {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => outcome.skipped += 1,
                Err(err) => outcome.failures.push((item_id, err)),
            }
        }

        let backend = &self.backend;
        let timeout = self.timeout;
        let results = join_all(changes.iter().map(|change| {
            bounded(
                timeout,
                "count write",
                backend.write_count(change.item_id, change.pass, change.value),
            )
        }))
        .await;

        let session = self.session_mut()?;
        for (change, result) in changes.iter().zip(results) {
            match result.and_then(|()| session.apply_count(change)) {
                Ok(()) => outcome.saved += 1,
                Err(err) => outcome.failures.push((change.item_id, err)),
            }
        }

        if !outcome.is_clean() {
            tracing::warn!(
                saved = outcome.saved,
                failed = outcome.failed(),
                "some counts were not saved"
            );
        }
        Ok(outcome)
    }

    /// Looks an item up by its code in the open session.
    pub fn item_id(&self, code: &str) -> ResultEngine<ItemId> {
        self.session()?
            .item_by_code(code)
            .map(|item| item.id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("code {code}")))
    }
}
