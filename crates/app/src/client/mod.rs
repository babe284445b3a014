//! HTTP implementation of the engine's [`Backend`] over the inventory REST
//! API.
use std::collections::HashMap;

use api_types::{
    ErrorResponse, WriteAck,
    assignment::{AssignmentRow, AssignmentWrite, LedgerResponse, PersonnelResponse},
    inventory::{CountWrite, LineItemView, NoteWrite, SessionQuery, SessionResponse},
    warehouse::{Health, Warehouse},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use engine::{Assignment, Backend, BackendError, ItemId, LineItem, Money, Pass, Quantity};
use reqwest::Url;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| AppError::input(format!("invalid base_url: {err}")))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|err| BackendError::Malformed(format!("invalid endpoint {path}: {err}")))
    }

    async fn get_json<Q, T>(&self, path: &str, query: Option<&Q>) -> std::result::Result<T, BackendError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self.http.get(self.endpoint(path)?);
        if let Some(query) = query {
            req = req.query(query);
        }
        tracing::debug!(path, "GET");
        let res = req.send().await.map_err(transport)?;
        let res = check(res).await?;
        res.json::<T>()
            .await
            .map_err(|err| BackendError::Malformed(format!("{path}: {err}")))
    }

    async fn post_json<B>(&self, path: &str, body: &B) -> std::result::Result<(), BackendError>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!(path, "POST");
        let res = self
            .http
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let ack = check(res)
            .await?
            .json::<WriteAck>()
            .await
            .map_err(|err| BackendError::Malformed(format!("{path}: {err}")))?;
        if !ack.success {
            tracing::warn!(path, "backend did not acknowledge the write");
            return Err(BackendError::Rejected {
                status: 200,
                message: "write not acknowledged".to_string(),
            });
        }
        Ok(())
    }

    pub async fn warehouses(&self) -> std::result::Result<Vec<Warehouse>, BackendError> {
        self.get_json::<(), _>("api/warehouses", None).await
    }

    pub async fn health(&self) -> std::result::Result<Health, BackendError> {
        self.get_json::<(), _>("api/health", None).await
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Unreachable(err.to_string())
}

/// Turns a non-2xx answer into [`BackendError::Rejected`], keeping the
/// backend's `{error}` message when there is one.
async fn check(res: reqwest::Response) -> std::result::Result<reqwest::Response, BackendError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let message = res
        .json::<ErrorResponse>()
        .await
        .map(|err| err.error)
        .unwrap_or_else(|_| "unknown error".to_string());
    tracing::warn!(status = status.as_u16(), %message, "backend rejected request");
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn line_item(view: LineItemView) -> LineItem {
    LineItem {
        id: ItemId(view.id),
        code: view.code,
        name: view.name,
        unit: view.unit,
        system_quantity: view.system_quantity.into(),
        first_count: view.first_count.map(Quantity::from),
        second_count: view.second_count.map(Quantity::from),
        notes: view.notes.unwrap_or_default(),
        unit_cost: view.unit_cost.map(Money::from_decimal).unwrap_or(Money::ZERO),
    }
}

fn row(assignment: &Assignment) -> AssignmentRow {
    AssignmentRow {
        person: assignment.person.clone(),
        quantity: assignment.quantity.decimal(),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_session(
        &self,
        date: NaiveDate,
        warehouse: &str,
    ) -> std::result::Result<Vec<LineItem>, BackendError> {
        let query = SessionQuery {
            date,
            warehouse: warehouse.to_string(),
        };
        let body: SessionResponse = self
            .get_json("api/inventory/session", Some(&query))
            .await?;
        Ok(body.items.into_iter().map(line_item).collect())
    }

    async fn write_count(
        &self,
        item_id: ItemId,
        pass: Pass,
        value: Option<Quantity>,
    ) -> std::result::Result<(), BackendError> {
        let payload = CountWrite {
            id: item_id.0,
            pass: pass.number(),
            quantity: value.map(Quantity::decimal),
        };
        self.post_json("api/inventory/count", &payload).await
    }

    async fn write_note(&self, item_id: ItemId, text: &str) -> std::result::Result<(), BackendError> {
        let payload = NoteWrite {
            id: item_id.0,
            notes: text.to_string(),
        };
        self.post_json("api/inventory/note", &payload).await
    }

    async fn fetch_personnel(&self) -> std::result::Result<Vec<String>, BackendError> {
        let body: PersonnelResponse = self.get_json::<(), _>("api/personnel", None).await?;
        Ok(body.personnel)
    }

    async fn fetch_ledger(
        &self,
        date: NaiveDate,
        warehouse: &str,
    ) -> std::result::Result<HashMap<ItemId, Vec<Assignment>>, BackendError> {
        let query = SessionQuery {
            date,
            warehouse: warehouse.to_string(),
        };
        let body: LedgerResponse = self.get_json("api/assignments", Some(&query)).await?;
        Ok(body
            .items
            .into_iter()
            .map(|item| {
                let rows = item
                    .rows
                    .into_iter()
                    .map(|row| Assignment::new(row.person, row.quantity.into()))
                    .collect();
                (ItemId(item.item_id), rows)
            })
            .collect())
    }

    async fn write_assignments(
        &self,
        item_id: ItemId,
        rows: &[Assignment],
    ) -> std::result::Result<(), BackendError> {
        let payload = AssignmentWrite {
            item_id: item_id.0,
            rows: rows.iter().map(row).collect(),
        };
        self.post_json("api/assignments", &payload).await
    }
}
