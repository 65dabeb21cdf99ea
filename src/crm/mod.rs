//! Cross-entity relationship and activity-timeline subsystem.
//!
//! [`CrmService`] wires the flow described in the console's data path: a
//! mutation goes through the entity repository, then activity logging and
//! relationship linking fire as best-effort side effects, and the timeline
//! recomputes the merged view on the next read.

pub mod activity;
pub mod lifecycle;
pub mod linker;
pub mod models;
pub mod repository;
pub mod timeline;

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::CrmSettings;
use crate::store::{DataStore, StoreError};

pub use activity::{ActivityLogger, MutationOutcome, SideEffect};
pub use lifecycle::StatusLifecycle;
pub use linker::RelationshipLinker;
pub use models::{
    Activity, ActivityKind, Appointment, AppointmentPatch, AppointmentStatus, Deal, DealStatus,
    Entity, Lead, LeadPatch, LeadStatus, NewActivity, NewAppointment, NewDeal, NewLead, NewTask,
    Task, TaskPatch, TaskStatus,
};
pub use repository::{EntityRepository, FallbackStore};
pub use timeline::{TimelineAggregator, TimelineEntry, TimelineSource};

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CrmService {
    settings: CrmSettings,
    cancel: CancellationToken,
    pub leads: Arc<EntityRepository<Lead>>,
    pub deals: Arc<EntityRepository<Deal>>,
    pub appointments: Arc<EntityRepository<Appointment>>,
    pub tasks: Arc<EntityRepository<Task>>,
    pub activities: Arc<EntityRepository<Activity>>,
    pub logger: Arc<ActivityLogger>,
    pub lifecycle: StatusLifecycle,
    pub linker: RelationshipLinker,
    pub timeline: TimelineAggregator,
}

impl CrmService {
    pub fn new(store: Arc<dyn DataStore>, fallback: FallbackStore, settings: CrmSettings) -> Self {
        let fallback = Arc::new(fallback);
        let cancel = CancellationToken::new();

        let leads = Arc::new(EntityRepository::<Lead>::new(
            store.clone(),
            fallback.clone(),
            cancel.clone(),
        ));
        let deals = Arc::new(EntityRepository::<Deal>::new(
            store.clone(),
            fallback.clone(),
            cancel.clone(),
        ));
        let appointments = Arc::new(EntityRepository::<Appointment>::new(
            store.clone(),
            fallback.clone(),
            cancel.clone(),
        ));
        let tasks = Arc::new(EntityRepository::<Task>::new(
            store.clone(),
            fallback.clone(),
            cancel.clone(),
        ));
        let activities = Arc::new(EntityRepository::<Activity>::new(
            store.clone(),
            fallback.clone(),
            cancel.clone(),
        ));

        let logger = Arc::new(ActivityLogger::new(activities.clone()));
        let lifecycle = StatusLifecycle::new(
            leads.clone(),
            deals.clone(),
            appointments.clone(),
            logger.clone(),
        );
        let linker = RelationshipLinker::new(tasks.clone(), appointments.clone(), logger.clone());
        let timeline =
            TimelineAggregator::new(activities.clone(), tasks.clone(), appointments.clone());

        Self {
            settings,
            cancel,
            leads,
            deals,
            appointments,
            tasks,
            activities,
            logger,
            lifecycle,
            linker,
            timeline,
        }
    }

    /// Tear the component down: any in-flight or subsequent store call
    /// resolves to [`StoreError::Cancelled`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether any repository served its last read from fallback seeds.
    pub fn is_degraded(&self) -> bool {
        self.leads.is_degraded()
            || self.deals.is_degraded()
            || self.appointments.is_degraded()
            || self.tasks.is_degraded()
            || self.activities.is_degraded()
    }

    // -- leads ------------------------------------------------------------

    /// Create a lead with the configured default status and auto-schedule
    /// the follow-up call `followup_offset_days` ahead.
    pub async fn create_lead(&self, mut input: NewLead) -> Result<MutationOutcome<Lead>, CrmError> {
        if input.status.is_none() {
            input.status = Some(self.settings.default_lead_status.clone());
        }
        let lead = self.leads.create(&input).await?;
        info!(lead = %lead.id, "lead created");
        let followup_at = Utc::now() + Duration::days(self.settings.followup_offset_days);
        let side_effect = self
            .logger
            .record(
                lead.id,
                ActivityKind::Call,
                format!("follow up with {} {}", lead.first_name, lead.last_name),
                Some(followup_at),
            )
            .await;
        Ok(MutationOutcome {
            entity: lead,
            side_effect,
        })
    }

    pub async fn update_lead(
        &self,
        id: Uuid,
        patch: LeadPatch,
    ) -> Result<MutationOutcome<Lead>, CrmError> {
        let lead = self.leads.update(id, &patch).await?;
        let side_effect = self
            .logger
            .record(id, ActivityKind::Update, "lead details updated", None)
            .await;
        Ok(MutationOutcome {
            entity: lead,
            side_effect,
        })
    }

    /// Delete a lead. The deletion activity is written first and outlives
    /// the lead; children keep their (now dangling) `lead_id` and can be
    /// re-pointed through [`RelationshipLinker`]. An unknown id is a no-op
    /// and records nothing.
    pub async fn delete_lead(&self, id: Uuid) -> Result<MutationOutcome<bool>, CrmError> {
        if self.leads.get_by_id(id).await?.is_none() {
            return Ok(MutationOutcome {
                entity: false,
                side_effect: SideEffect::Skipped,
            });
        }
        let side_effect = self
            .logger
            .record(id, ActivityKind::Delete, "lead deleted", None)
            .await;
        let removed = self.leads.remove(id).await?;
        Ok(MutationOutcome {
            entity: removed,
            side_effect,
        })
    }

    // -- appointments ------------------------------------------------------

    pub async fn create_appointment(
        &self,
        input: NewAppointment,
    ) -> Result<MutationOutcome<Appointment>, CrmError> {
        let appointment = self.appointments.create(&input).await?;
        let side_effect = self
            .logger
            .record_for(
                appointment.lead_id,
                ActivityKind::Create,
                format!("appointment '{}' scheduled", appointment.title),
            )
            .await;
        Ok(MutationOutcome {
            entity: appointment,
            side_effect,
        })
    }

    pub async fn update_appointment(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<MutationOutcome<Appointment>, CrmError> {
        let appointment = self.appointments.update(id, &patch).await?;
        let side_effect = self
            .logger
            .record_for(
                appointment.lead_id,
                ActivityKind::Update,
                format!("appointment '{}' updated", appointment.title),
            )
            .await;
        Ok(MutationOutcome {
            entity: appointment,
            side_effect,
        })
    }

    pub async fn delete_appointment(&self, id: Uuid) -> Result<MutationOutcome<bool>, CrmError> {
        let lead_id = self
            .appointments
            .get_by_id(id)
            .await?
            .and_then(|a| a.lead_id);
        let removed = self.appointments.remove(id).await?;
        let side_effect = if removed {
            self.logger
                .record_for(lead_id, ActivityKind::Delete, "appointment removed")
                .await
        } else {
            SideEffect::Skipped
        };
        Ok(MutationOutcome {
            entity: removed,
            side_effect,
        })
    }

    // -- tasks -------------------------------------------------------------

    pub async fn create_task(&self, input: NewTask) -> Result<MutationOutcome<Task>, CrmError> {
        let task = self.tasks.create(&input).await?;
        let side_effect = self
            .logger
            .record_for(
                task.lead_id,
                ActivityKind::Create,
                format!("task '{}' created", task.title),
            )
            .await;
        Ok(MutationOutcome {
            entity: task,
            side_effect,
        })
    }

    pub async fn update_task(
        &self,
        id: Uuid,
        patch: TaskPatch,
    ) -> Result<MutationOutcome<Task>, CrmError> {
        let task = self.tasks.update(id, &patch).await?;
        let side_effect = self
            .logger
            .record_for(
                task.lead_id,
                ActivityKind::Update,
                format!("task '{}' updated", task.title),
            )
            .await;
        Ok(MutationOutcome {
            entity: task,
            side_effect,
        })
    }

    pub async fn complete_task(&self, task: &Task) -> Result<MutationOutcome<Task>, CrmError> {
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            completed_at: Some(Utc::now()),
            ..TaskPatch::default()
        };
        let task = self.tasks.update(task.id, &patch).await?;
        let side_effect = self
            .logger
            .record_for(
                task.lead_id,
                ActivityKind::Complete,
                format!("task '{}' completed", task.title),
            )
            .await;
        Ok(MutationOutcome {
            entity: task,
            side_effect,
        })
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<MutationOutcome<bool>, CrmError> {
        let lead_id = self.tasks.get_by_id(id).await?.and_then(|t| t.lead_id);
        let removed = self.tasks.remove(id).await?;
        let side_effect = if removed {
            self.logger
                .record_for(lead_id, ActivityKind::Delete, "task removed")
                .await
        } else {
            SideEffect::Skipped
        };
        Ok(MutationOutcome {
            entity: removed,
            side_effect,
        })
    }

    // -- deals -------------------------------------------------------------

    pub async fn create_deal(&self, input: NewDeal) -> Result<MutationOutcome<Deal>, CrmError> {
        let deal = self.deals.create(&input).await?;
        let side_effect = self
            .logger
            .record_for(
                deal.lead_id,
                ActivityKind::Create,
                format!("deal '{}' opened", deal.name),
            )
            .await;
        Ok(MutationOutcome {
            entity: deal,
            side_effect,
        })
    }

    // -- activities --------------------------------------------------------

    /// Direct user-authored entry (note, call, email, meeting). Unlike the
    /// automatic side-effect records, failures here surface to the caller.
    pub async fn add_activity(&self, mut input: NewActivity) -> Result<Activity, CrmError> {
        if input.created_by.is_none() {
            input.created_by = self.activities.acting_user();
        }
        self.activities.create(&input).await
    }

    /// Activities are never edited, only completed or deleted outright.
    pub async fn delete_activity(&self, id: Uuid) -> Result<bool, CrmError> {
        self.activities.remove(id).await
    }
}
