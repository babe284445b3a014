#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use engine::{
    Assignment, Backend, BackendError, Engine, ItemId, LineItem, Money, Pass, Quantity,
};

#[derive(Default)]
pub struct State {
    pub items: Vec<LineItem>,
    pub personnel: Vec<String>,
    pub ledger: HashMap<ItemId, Vec<Assignment>>,
    pub count_writes: Vec<(ItemId, Pass, Option<Quantity>)>,
    pub note_writes: Vec<(ItemId, String)>,
    pub assignment_writes: Vec<(ItemId, Vec<Assignment>)>,
    /// Writes for these items are rejected.
    pub failing: HashSet<ItemId>,
    /// Every call fails as if the network were down.
    pub offline: bool,
    /// Every call hangs forever.
    pub stalled: bool,
    /// Personnel and ledger loads fail; session loads and writes still work.
    pub ledger_down: bool,
}

/// Backend keeping everything in memory and recording every write.
#[derive(Default)]
pub struct MemoryBackend {
    pub state: Mutex<State>,
}

impl MemoryBackend {
    pub fn with_items(items: Vec<LineItem>) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().items = items;
        backend.state.lock().unwrap().personnel =
            ["Ana", "Luis", "Marta"].map(String::from).to_vec();
        backend
    }

    pub fn count_writes(&self) -> usize {
        self.state.lock().unwrap().count_writes.len()
    }

    pub fn set<F: FnOnce(&mut State)>(&self, f: F) {
        f(&mut self.state.lock().unwrap());
    }

    async fn gate(&self, item_id: Option<ItemId>) -> Result<(), BackendError> {
        let (offline, stalled, failing) = {
            let state = self.state.lock().unwrap();
            let failing = item_id.is_some_and(|id| state.failing.contains(&id));
            (state.offline, state.stalled, failing)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        if offline {
            return Err(BackendError::Unreachable("connection refused".to_string()));
        }
        if failing {
            return Err(BackendError::Rejected {
                status: 500,
                message: "write rejected".to_string(),
            });
        }
        Ok(())
    }

    fn ledger_gate(&self) -> Result<(), BackendError> {
        if self.state.lock().unwrap().ledger_down {
            return Err(BackendError::Rejected {
                status: 503,
                message: "ledger unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_session(
        &self,
        _date: NaiveDate,
        _warehouse: &str,
    ) -> Result<Vec<LineItem>, BackendError> {
        self.gate(None).await?;
        Ok(self.state.lock().unwrap().items.clone())
    }

    async fn write_count(
        &self,
        item_id: ItemId,
        pass: Pass,
        value: Option<Quantity>,
    ) -> Result<(), BackendError> {
        self.gate(Some(item_id)).await?;
        let mut state = self.state.lock().unwrap();
        state.count_writes.push((item_id, pass, value));
        if let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) {
            match pass {
                Pass::First => item.first_count = value,
                Pass::Second => item.second_count = value,
            }
        }
        Ok(())
    }

    async fn write_note(&self, item_id: ItemId, text: &str) -> Result<(), BackendError> {
        self.gate(Some(item_id)).await?;
        let mut state = self.state.lock().unwrap();
        state.note_writes.push((item_id, text.to_string()));
        if let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) {
            item.notes = text.to_string();
        }
        Ok(())
    }

    async fn fetch_personnel(&self) -> Result<Vec<String>, BackendError> {
        self.gate(None).await?;
        self.ledger_gate()?;
        Ok(self.state.lock().unwrap().personnel.clone())
    }

    async fn fetch_ledger(
        &self,
        _date: NaiveDate,
        _warehouse: &str,
    ) -> Result<HashMap<ItemId, Vec<Assignment>>, BackendError> {
        self.gate(None).await?;
        self.ledger_gate()?;
        Ok(self.state.lock().unwrap().ledger.clone())
    }

    async fn write_assignments(
        &self,
        item_id: ItemId,
        rows: &[Assignment],
    ) -> Result<(), BackendError> {
        self.gate(Some(item_id)).await?;
        let mut state = self.state.lock().unwrap();
        state.assignment_writes.push((item_id, rows.to_vec()));
        state.ledger.insert(item_id, rows.to_vec());
        Ok(())
    }
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

pub fn q(value: &str) -> Quantity {
    value.parse().unwrap()
}

pub fn item(id: i64, code: &str, system: &str) -> LineItem {
    LineItem::new(ItemId(id), code, format!("Product {code}"), q(system)).unit_cost(Money::new(2, 0))
}

pub fn engine(items: Vec<LineItem>) -> Engine<MemoryBackend> {
    Engine::builder(MemoryBackend::with_items(items)).build()
}
