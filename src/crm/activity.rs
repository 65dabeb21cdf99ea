//! Best-effort activity recording.
//!
//! Every lead-linked mutation appends a row to `lead_activities`. Recording
//! is never transactional with the primary mutation: a failed append is
//! logged and swallowed, and the two-phase [`MutationOutcome`] lets callers
//! and tests tell "mutation succeeded, logging failed" apart from full
//! success without the distinction being swallowed.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::models::{Activity, ActivityKind, NewActivity};
use super::repository::EntityRepository;

/// What happened to the side-effect record of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Recorded(Activity),
    Failed(String),
    /// No lead in context, nothing to record against.
    Skipped,
}

impl SideEffect {
    pub fn recorded(&self) -> Option<&Activity> {
        match self {
            SideEffect::Recorded(activity) => Some(activity),
            _ => None,
        }
    }
}

/// Primary mutation result plus the fate of its activity record.
#[derive(Debug, Clone)]
pub struct MutationOutcome<T> {
    pub entity: T,
    pub side_effect: SideEffect,
}

pub struct ActivityLogger {
    activities: std::sync::Arc<EntityRepository<Activity>>,
}

impl ActivityLogger {
    pub fn new(activities: std::sync::Arc<EntityRepository<Activity>>) -> Self {
        Self { activities }
    }

    /// Append one activity row. Failures are reported in the return value
    /// and logged, never raised — the primary mutation already happened.
    pub async fn record(
        &self,
        lead_id: Uuid,
        kind: ActivityKind,
        description: impl Into<String>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> SideEffect {
        let entry = NewActivity {
            lead_id,
            kind,
            description: description.into(),
            created_by: self.activities.acting_user(),
            scheduled_at,
        };
        match self.activities.create(&entry).await {
            Ok(activity) => SideEffect::Recorded(activity),
            Err(err) => {
                warn!(%lead_id, kind = kind.as_str(), error = %err, "activity record dropped");
                SideEffect::Failed(err.to_string())
            }
        }
    }

    /// Record against an optional lead context; no lead means [`SideEffect::Skipped`].
    pub async fn record_for(
        &self,
        lead_id: Option<Uuid>,
        kind: ActivityKind,
        description: impl Into<String>,
    ) -> SideEffect {
        match lead_id {
            Some(lead_id) => self.record(lead_id, kind, description, None).await,
            None => SideEffect::Skipped,
        }
    }

    /// Activities are immutable except for completion.
    pub async fn mark_complete(&self, activity_id: Uuid) -> Result<Activity, super::CrmError> {
        self.activities
            .update(
                activity_id,
                &serde_json::json!({ "completed_at": Utc::now().to_rfc3339() }),
            )
            .await
    }
}
