//! crmkit — the CRM console's relationship and activity-timeline subsystem.
//!
//! Everything visual (forms, tables, calendars, routing, auth) lives in the
//! console itself; this crate owns the data path behind it: typed CRUD over
//! the hosted relational store with graceful read degradation, best-effort
//! activity logging, status lifecycles, lead/child relationship upkeep, and
//! the merged per-lead timeline.

pub mod config;
pub mod crm;
pub mod store;

use std::sync::Arc;

pub use config::AppConfig;
pub use crm::{CrmError, CrmService, FallbackStore};
pub use store::{DataStore, MemoryStore, RestStore};

/// Wire a [`CrmService`] against the hosted store described by `config`.
pub fn connect(config: &AppConfig, fallback: FallbackStore) -> Result<CrmService, CrmError> {
    let store: Arc<dyn DataStore> = Arc::new(RestStore::new(&config.store)?);
    Ok(CrmService::new(store, fallback, config.crm.clone()))
}

/// Install the diagnostic subscriber. Binaries and test harnesses call this
/// once; the filter honors `RUST_LOG`.
pub fn init_diagnostics() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
