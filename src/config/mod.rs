//! Layered configuration: built-in defaults, then `crmkit.toml`, then
//! `CRM_`-prefixed environment variables (highest precedence). A local
//! `.env` file is honored before the environment is read.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreSettings,
    pub crm: CrmSettings,
}

/// Connection settings for the hosted relational service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub base_url: String,
    pub api_key: String,
    /// Identity stamped into `created_by`/`owner_id` columns.
    pub acting_user: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmSettings {
    /// Status a new lead is created with. The hosted store is seeded with
    /// localized labels, hence the non-English default.
    pub default_lead_status: String,
    /// Days ahead to schedule the automatic follow-up call for a new lead.
    pub followup_offset_days: i64,
    /// Default page size for list reads.
    pub page_limit: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: String::new(),
            acting_user: None,
        }
    }
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            default_lead_status: "جديد".to_string(),
            followup_offset_days: 3,
            page_limit: 50,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            crm: CrmSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from defaults, `crmkit.toml`, and `CRM_*` env vars
    /// (e.g. `CRM_STORE__BASE_URL`, `CRM_CRM__FOLLOWUP_OFFSET_DAYS`).
    pub fn load() -> Result<Self, figment::Error> {
        dotenvy::dotenv().ok();
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("crmkit.toml"))
            .merge(Env::prefixed("CRM_").split("__"))
            .extract()
    }
}
