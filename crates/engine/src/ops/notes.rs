use futures::future::join_all;

use super::{BatchOutcome, Engine, WriteOutcome, bounded};
use crate::{Backend, ItemId, ResultEngine};

impl<B: Backend> Engine<B> {
    /// Stores the note explaining a finalized discrepancy.
    pub async fn record_note(&mut self, item_id: ItemId, text: &str) -> ResultEngine<WriteOutcome> {
        let Some(change) = self.session()?.note_change(item_id, text)? else {
            return Ok(WriteOutcome::Unchanged);
        };

        bounded(
            self.timeout,
            "note write",
            self.backend.write_note(item_id, &change.text),
        )
        .await?;

        self.session_mut()?.apply_note(&change)?;
        Ok(WriteOutcome::Saved)
    }

    /// Stores every given note, best effort. Unlike [`Engine::record_note`]
    /// unchanged notes are written again, so the backend ends up holding
    /// exactly what the counter sees.
    pub async fn record_notes(
        &mut self,
        notes: impl IntoIterator<Item = (ItemId, String)>,
    ) -> ResultEngine<BatchOutcome> {
        let session = self.session()?;
        let mut outcome = BatchOutcome::default();
        let mut changes = Vec::new();

        for (item_id, text) in notes {
            match session.note_change(item_id, &text) {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => changes.push(crate::NoteChange {
                    item_id,
                    text: text.trim().to_string(),
                }),
                Err(err) => outcome.failures.push((item_id, err)),
            }
        }

        let backend = &self.backend;
        let timeout = self.timeout;
        let results = join_all(changes.iter().map(|change| {
            bounded(
                timeout,
                "note write",
                backend.write_note(change.item_id, &change.text),
            )
        }))
        .await;

        let session = self.session_mut()?;
        for (change, result) in changes.iter().zip(results) {
            match result.and_then(|()| session.apply_note(change)) {
                Ok(()) => outcome.saved += 1,
                Err(err) => outcome.failures.push((change.item_id, err)),
            }
        }

        if !outcome.is_clean() {
            tracing::warn!(failed = outcome.failed(), "some notes were not saved");
        }
        Ok(outcome)
    }
}
