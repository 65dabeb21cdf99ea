//! Generic typed CRUD façade over the hosted store, one instance per entity.
//!
//! Reads degrade to an injected [`FallbackStore`] when the backend is
//! unreachable so the console keeps rendering during an outage; writes never
//! do, because a fabricated write would silently diverge from the remote
//! source of truth.

use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{from_row, to_row, StoreModel};
use super::CrmError;
use crate::store::{with_cancel, DataStore, Filter, Row, StoreError, Table};

/// Seed rows served when the backend cannot be reached.
///
/// Injected at construction (never a module-level global) so each test and
/// each service instance owns its own degradation data.
#[derive(Debug, Clone, Default)]
pub struct FallbackStore {
    seeds: HashMap<Table, Vec<Row>>,
}

impl FallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, table: Table, rows: Vec<Row>) -> Self {
        self.seeds.entry(table).or_default().extend(rows);
        self
    }

    pub fn rows(&self, table: Table, filter: &Filter) -> Vec<Row> {
        self.seeds
            .get(&table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default()
    }
}

pub struct EntityRepository<T: StoreModel> {
    store: Arc<dyn DataStore>,
    fallback: Arc<FallbackStore>,
    cancel: CancellationToken,
    /// Set when the last read was served from fallback seeds, so callers can
    /// surface staleness instead of presenting degraded data as live.
    degraded: AtomicBool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: StoreModel> EntityRepository<T> {
    pub fn new(
        store: Arc<dyn DataStore>,
        fallback: Arc<FallbackStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            fallback,
            cancel,
            degraded: AtomicBool::new(false),
            _entity: PhantomData,
        }
    }

    /// Whether the most recent read came from fallback seeds.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn acting_user(&self) -> Option<Uuid> {
        self.store.acting_user()
    }

    pub async fn list(&self, filter: &Filter) -> Result<Vec<T>, CrmError> {
        let selected = with_cancel(&self.cancel, self.store.select(T::TABLE, filter)).await;
        let rows = match selected {
            Ok(rows) => {
                self.degraded.store(false, Ordering::SeqCst);
                rows
            }
            Err(StoreError::Unavailable(reason)) => {
                warn!(
                    entity = T::NAME,
                    %reason,
                    "store unreachable, serving fallback rows"
                );
                self.degraded.store(true, Ordering::SeqCst);
                self.fallback.rows(T::TABLE, filter)
            }
            Err(err) => return Err(err.into()),
        };
        rows.into_iter()
            .map(|row| from_row(row).map_err(CrmError::from))
            .collect()
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, CrmError> {
        let filter = Filter::new().eq("id", id);
        Ok(self.list(&filter).await?.into_iter().next())
    }

    pub async fn create(&self, input: &impl Serialize) -> Result<T, CrmError> {
        let mut row = to_row(input)?;
        T::normalize(&mut row);
        T::validate_insert(&row)?;
        let inserted = with_cancel(&self.cancel, self.store.insert(T::TABLE, row)).await?;
        debug!(entity = T::NAME, "created");
        Ok(from_row(inserted)?)
    }

    pub async fn update(&self, id: Uuid, patch: &impl Serialize) -> Result<T, CrmError> {
        let mut row = to_row(patch)?;
        T::normalize(&mut row);
        T::validate_patch(&row)?;
        if T::patch_needs_stored_row(&row) {
            let filter = Filter::new().eq("id", id);
            let mut merged = with_cancel(&self.cancel, self.store.select(T::TABLE, &filter))
                .await?
                .into_iter()
                .next()
                .ok_or(CrmError::NotFound(T::NAME))?;
            for (key, value) in &row {
                merged.insert(key.clone(), value.clone());
            }
            T::validate_merged(&merged)?;
        }
        let updated = with_cancel(&self.cancel, self.store.update(T::TABLE, id, row)).await;
        match updated {
            Ok(row) => {
                debug!(entity = T::NAME, %id, "updated");
                Ok(from_row(row)?)
            }
            Err(err) if err.is_not_found() => Err(CrmError::NotFound(T::NAME)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn remove(&self, id: Uuid) -> Result<bool, CrmError> {
        let removed = with_cancel(&self.cancel, self.store.delete(T::TABLE, id)).await?;
        debug!(entity = T::NAME, %id, removed, "delete");
        Ok(removed)
    }
}
