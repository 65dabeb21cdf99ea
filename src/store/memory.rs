//! In-memory [`DataStore`] used by tests and offline tooling.
//!
//! Mimics the hosted service's row defaults: inserts receive a generated
//! `id` and `created_at`/`updated_at` stamps when the caller omits them.
//! An `offline` switch makes every call fail with
//! [`StoreError::Unavailable`] to exercise degradation paths.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DataStore, Filter, Row, StoreError, Table};

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
    offline: AtomicBool,
    actor: Option<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(actor: Uuid) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    /// Simulate a backend outage.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn row_id(row: &Row) -> Option<Uuid> {
        row.get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let rows = tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row, StoreError> {
        self.check_online()?;
        let now = Utc::now().to_rfc3339();
        if Self::row_id(&row).is_none() {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        row.entry("created_at".to_string())
            .or_insert_with(|| Value::String(now.clone()));
        row.entry("updated_at".to_string())
            .or_insert_with(|| Value::String(now));
        let mut tables = self.tables.write().await;
        tables.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<Row, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let row = rows
            .iter_mut()
            .find(|r| Self::row_id(r) == Some(id))
            .ok_or_else(|| StoreError::not_found(table.as_str()))?;
        for (key, value) in patch {
            row.insert(key, value);
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|r| Self::row_id(r) != Some(id));
        Ok(rows.len() < before)
    }

    fn acting_user(&self) -> Option<Uuid> {
        self.actor
    }
}
