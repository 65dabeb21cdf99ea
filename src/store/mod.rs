//! Data-store boundary.
//!
//! The hosted relational service is consumed through the [`DataStore`] trait:
//! filtered select, insert, update-by-id, delete-by-id, plus the acting user
//! identity used to stamp `created_by`/`owner_id` columns. Rows travel as
//! JSON objects and are decoded into typed entities by the caller.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// A row as the hosted store ships it: a flat JSON object.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Leads,
    Deals,
    Appointments,
    Tasks,
    LeadActivities,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Leads => "leads",
            Table::Deals => "deals",
            Table::Appointments => "appointments",
            Table::Tasks => "tasks",
            Table::LeadActivities => "lead_activities",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("row decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn not_found(what: &str) -> Self {
        StoreError::Rejected {
            status: 404,
            message: format!("{what} not found"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Rejected { status: 404, .. })
    }
}

#[derive(Debug, Clone)]
enum Cond {
    Eq(String, Value),
    IsNull(String),
    NotNull(String),
}

/// Conjunction of column predicates. Equality and null checks are all the
/// subsystem needs; anything richer belongs to the store's own client.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conds: Vec<Cond>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.conds.push(Cond::Eq(column.to_string(), value));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.conds.push(Cond::IsNull(column.to_string()));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.conds.push(Cond::NotNull(column.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }

    /// Evaluate against an in-memory row. A missing column counts as null.
    pub fn matches(&self, row: &Row) -> bool {
        self.conds.iter().all(|cond| match cond {
            Cond::Eq(col, value) => row.get(col).map(|v| v == value).unwrap_or(false),
            Cond::IsNull(col) => row.get(col).map(Value::is_null).unwrap_or(true),
            Cond::NotNull(col) => row.get(col).map(|v| !v.is_null()).unwrap_or(false),
        })
    }

    /// Render as PostgREST-style query parameters.
    pub fn to_query(&self) -> Vec<(String, String)> {
        self.conds
            .iter()
            .map(|cond| match cond {
                Cond::Eq(col, value) => {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (col.clone(), format!("eq.{rendered}"))
                }
                Cond::IsNull(col) => (col.clone(), "is.null".to_string()),
                Cond::NotNull(col) => (col.clone(), "not.is.null".to_string()),
            })
            .collect()
    }
}

/// Row-level CRUD against the hosted relational service.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError>;
    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError>;
    async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<Row, StoreError>;
    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StoreError>;

    /// Identity stamped into `created_by`/`owner_id` columns.
    fn acting_user(&self) -> Option<Uuid>;
}

/// Race a store call against component teardown. Every repository call goes
/// through here so a torn-down service never leaves a request in flight.
pub async fn with_cancel<T>(
    token: &CancellationToken,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StoreError::Cancelled),
        result = call => result,
    }
}
