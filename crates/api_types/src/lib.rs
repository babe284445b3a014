use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a 2xx answer to any write.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteAck {
    pub success: bool,
}

pub mod warehouse {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Warehouse {
        pub id: String,
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Health {
        pub status: String,
    }
}

pub mod inventory {
    use super::*;

    /// Query string identifying a counting session.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SessionQuery {
        pub date: NaiveDate,
        pub warehouse: String,
    }

    /// One product row of a counting session as stored by the backend.
    ///
    /// Quantities are accepted both as JSON numbers and as strings.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct LineItemView {
        pub id: i64,
        pub code: String,
        pub name: String,
        #[serde(default)]
        pub unit: Option<String>,
        pub system_quantity: Decimal,
        #[serde(default)]
        pub first_count: Option<Decimal>,
        #[serde(default)]
        pub second_count: Option<Decimal>,
        #[serde(default)]
        pub notes: Option<String>,
        /// Missing means "no cost data" and is treated as zero.
        #[serde(default)]
        pub unit_cost: Option<Decimal>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SessionResponse {
        pub items: Vec<LineItemView>,
    }

    /// Records (or clears, with `quantity: null`) the count of one pass.
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct CountWrite {
        pub id: i64,
        /// `1` or `2`.
        pub pass: u8,
        pub quantity: Option<Decimal>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct NoteWrite {
        pub id: i64,
        pub notes: String,
    }
}

pub mod assignment {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct AssignmentRow {
        pub person: String,
        pub quantity: Decimal,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PersonnelResponse {
        pub personnel: Vec<String>,
    }

    /// All saved rows of one line item.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct ItemAssignments {
        pub item_id: i64,
        pub rows: Vec<AssignmentRow>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerResponse {
        pub items: Vec<ItemAssignments>,
    }

    /// Replaces the whole assignment set of one line item.
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct AssignmentWrite {
        pub item_id: i64,
        pub rows: Vec<AssignmentRow>,
    }
}
