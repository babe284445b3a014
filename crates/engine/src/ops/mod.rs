use std::{future::Future, time::Duration};

use chrono::NaiveDate;

use crate::{
    AssignmentLedger, Backend, BackendError, EngineError, ItemId, LineItem, ResultEngine, Session,
    Stage,
};

mod assignments;
mod counts;
mod notes;

/// Upper bound of a single backend call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of a single write command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The backend confirmed the value and the session was updated.
    Saved,
    /// The value was already stored; nothing was sent.
    Unchanged,
}

/// Outcome of a best-effort batch: every item is handled independently.
#[derive(Debug, Default, PartialEq)]
pub struct BatchOutcome {
    pub saved: usize,
    pub skipped: usize,
    pub failures: Vec<(ItemId, EngineError)>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs a backend call under the configured timeout. A timeout is reported
/// as a persistence failure, like any other unconfirmed write.
async fn bounded<T>(
    timeout: Duration,
    what: &str,
    call: impl Future<Output = Result<T, BackendError>>,
) -> ResultEngine<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::warn!("{what} failed: {err}");
            Err(err.into())
        }
        Err(_) => {
            tracing::warn!("{what} timed out after {timeout:?}");
            Err(EngineError::Persistence(format!(
                "{what} timed out after {}s",
                timeout.as_secs_f32()
            )))
        }
    }
}

/// Command layer of a counting view.
///
/// The engine owns at most one [`Session`] (and, once finalized, its
/// [`AssignmentLedger`]). Opening another session discards the previous one.
#[derive(Debug)]
pub struct Engine<B> {
    backend: B,
    timeout: Duration,
    session: Option<Session>,
    ledger: Option<AssignmentLedger>,
}

impl<B: Backend> Engine<B> {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder(backend: B) -> EngineBuilder<B> {
        EngineBuilder {
            backend,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Loads the (date, warehouse) session and derives its stage.
    ///
    /// Any failure is fatal for the view: no session remains open.
    pub async fn open_session(&mut self, date: NaiveDate, warehouse: &str) -> ResultEngine<&Session> {
        self.session = None;
        self.ledger = None;

        let items: Vec<LineItem> = bounded(
            self.timeout,
            "session load",
            self.backend.fetch_session(date, warehouse),
        )
        .await
        .inspect_err(|err| tracing::error!(%date, warehouse, "cannot open session: {err}"))?;

        if let Some((item, field)) = items
            .iter()
            .find_map(|item| item.out_of_range().map(|field| (item, field)))
        {
            let err = EngineError::from(BackendError::Malformed(format!(
                "{}: {field} out of range",
                item.code
            )));
            tracing::error!(%date, warehouse, "cannot open session: {err}");
            return Err(err);
        }

        let session = Session::load(date, warehouse, items)?;
        if session.stage() == Stage::Finalized {
            let ledger = self
                .load_ledger(&session)
                .await
                .inspect_err(|err| tracing::error!(%date, warehouse, "cannot load ledger: {err}"))?;
            self.ledger = Some(ledger);
        }

        Ok(&*self.session.insert(session))
    }

    /// Drops the open session, if any.
    pub fn close_session(&mut self) {
        self.session = None;
        self.ledger = None;
    }

    async fn load_ledger(&self, session: &Session) -> ResultEngine<AssignmentLedger> {
        let (personnel, saved) = futures::future::try_join(
            bounded(
                self.timeout,
                "personnel load",
                self.backend.fetch_personnel(),
            ),
            bounded(
                self.timeout,
                "ledger load",
                self.backend
                    .fetch_ledger(session.date(), session.warehouse()),
            ),
        )
        .await?;

        if let Some((item_id, _)) = saved
            .iter()
            .find(|(_, rows)| rows.iter().any(|row| !row.quantity.in_range()))
        {
            return Err(BackendError::Malformed(format!(
                "assignments of item {item_id}: quantity out of range"
            ))
            .into());
        }

        Ok(AssignmentLedger::new(
            &session.discrepancies(),
            personnel,
            saved,
        ))
    }

    pub fn session(&self) -> ResultEngine<&Session> {
        self.session.as_ref().ok_or(EngineError::NoSession)
    }

    fn session_mut(&mut self) -> ResultEngine<&mut Session> {
        self.session.as_mut().ok_or(EngineError::NoSession)
    }

    pub fn stage(&self) -> ResultEngine<Stage> {
        Ok(self.session()?.stage())
    }

    pub fn visible_items(&self) -> ResultEngine<Vec<&LineItem>> {
        Ok(self.session()?.visible_items())
    }

    pub fn failed_codes(&self) -> ResultEngine<Vec<&str>> {
        Ok(self
            .session()?
            .failed_codes()
            .iter()
            .map(String::as_str)
            .collect())
    }

    /// Moves the session to its next stage. Reaching the finalized stage
    /// loads the personnel list and the saved assignments.
    pub async fn advance_stage(&mut self) -> ResultEngine<Stage> {
        let stage = self.session_mut()?.advance_stage()?;
        if stage != Stage::Finalized {
            return Ok(stage);
        }

        let loaded = {
            let session = self.session()?;
            self.load_ledger(session).await
        };
        match loaded {
            Ok(ledger) => {
                self.ledger = Some(ledger);
                Ok(stage)
            }
            Err(err) => {
                tracing::error!("cannot load ledger after finalizing: {err}");
                self.close_session();
                Err(err)
            }
        }
    }
}

/// The builder for `Engine`
pub struct EngineBuilder<B> {
    backend: B,
    timeout: Duration,
}

impl<B: Backend> EngineBuilder<B> {
    /// Bound every backend call by `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> EngineBuilder<B> {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Engine<B> {
        Engine {
            backend: self.backend,
            timeout: self.timeout,
            session: None,
            ledger: None,
        }
    }
}
