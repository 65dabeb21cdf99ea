//! Foreign-key maintenance between a lead and its child records.
//!
//! Linking is a single-field patch on the child; the lead side holds no
//! collection and is always resolved by querying children on `lead_id`.
//! There is no cascade: deleting a lead leaves its children in place.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::activity::{ActivityLogger, MutationOutcome};
use super::models::{ActivityKind, Appointment, Task};
use super::repository::EntityRepository;
use super::CrmError;

pub struct RelationshipLinker {
    tasks: Arc<EntityRepository<Task>>,
    appointments: Arc<EntityRepository<Appointment>>,
    logger: Arc<ActivityLogger>,
}

impl RelationshipLinker {
    pub fn new(
        tasks: Arc<EntityRepository<Task>>,
        appointments: Arc<EntityRepository<Appointment>>,
        logger: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            tasks,
            appointments,
            logger,
        }
    }

    /// Point a task (orphaned or not) at a lead.
    pub async fn link_task_to_lead(
        &self,
        task_id: Uuid,
        lead_id: Uuid,
    ) -> Result<MutationOutcome<Task>, CrmError> {
        let entity = self
            .tasks
            .update(
                task_id,
                &json!({
                    "lead_id": lead_id,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        info!(task = %task_id, lead = %lead_id, "task linked to lead");
        let side_effect = self
            .logger
            .record(
                lead_id,
                ActivityKind::Update,
                format!("task '{}' linked to lead", entity.title),
                None,
            )
            .await;
        Ok(MutationOutcome { entity, side_effect })
    }

    /// Point an appointment (orphaned or not) at a lead.
    pub async fn link_appointment_to_lead(
        &self,
        appointment_id: Uuid,
        lead_id: Uuid,
    ) -> Result<MutationOutcome<Appointment>, CrmError> {
        let entity = self
            .appointments
            .update(
                appointment_id,
                &json!({
                    "lead_id": lead_id,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        info!(appointment = %appointment_id, lead = %lead_id, "appointment linked to lead");
        let side_effect = self
            .logger
            .record(
                lead_id,
                ActivityKind::Update,
                format!("appointment '{}' linked to lead", entity.title),
                None,
            )
            .await;
        Ok(MutationOutcome { entity, side_effect })
    }
}
