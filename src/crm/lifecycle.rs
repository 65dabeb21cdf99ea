//! Status state machines for leads, deals, and appointments.
//!
//! Transitions only move forward or into a terminal state; anything outside
//! the per-state allowed set is rejected instead of written. Re-asserting
//! the state an entity already holds is an idempotent success: no write
//! happens, but the activity record is still appended.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::activity::{ActivityLogger, MutationOutcome};
use super::models::{
    ActivityKind, Appointment, AppointmentStatus, Deal, DealStatus, Lead, LeadStatus,
};
use super::repository::EntityRepository;
use super::CrmError;

pub fn allowed_appointment_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Scheduled => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

/// Intermediate stages may be skipped, but movement is strictly forward.
pub fn allowed_lead_transitions(current: LeadStatus) -> &'static [LeadStatus] {
    match current {
        LeadStatus::New => &[
            LeadStatus::Qualified,
            LeadStatus::Negotiation,
            LeadStatus::Won,
            LeadStatus::Lost,
        ],
        LeadStatus::Qualified => &[LeadStatus::Negotiation, LeadStatus::Won, LeadStatus::Lost],
        LeadStatus::Negotiation => &[LeadStatus::Won, LeadStatus::Lost],
        LeadStatus::Won | LeadStatus::Lost => &[],
    }
}

pub fn allowed_deal_transitions(current: DealStatus) -> &'static [DealStatus] {
    match current {
        DealStatus::Active => &[DealStatus::Won, DealStatus::Lost],
        DealStatus::Won | DealStatus::Lost => &[],
    }
}

pub struct StatusLifecycle {
    leads: Arc<EntityRepository<Lead>>,
    deals: Arc<EntityRepository<Deal>>,
    appointments: Arc<EntityRepository<Appointment>>,
    logger: Arc<ActivityLogger>,
}

impl StatusLifecycle {
    pub fn new(
        leads: Arc<EntityRepository<Lead>>,
        deals: Arc<EntityRepository<Deal>>,
        appointments: Arc<EntityRepository<Appointment>>,
        logger: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            leads,
            deals,
            appointments,
            logger,
        }
    }

    pub async fn transition_appointment(
        &self,
        appointment: &Appointment,
        target: AppointmentStatus,
    ) -> Result<MutationOutcome<Appointment>, CrmError> {
        let kind = match target {
            AppointmentStatus::Completed => ActivityKind::Complete,
            _ => ActivityKind::Update,
        };
        let description = format!("appointment '{}' marked {}", appointment.title, target.as_str());

        if target == appointment.status {
            let side_effect = self
                .logger
                .record_for(appointment.lead_id, kind, description)
                .await;
            return Ok(MutationOutcome {
                entity: appointment.clone(),
                side_effect,
            });
        }
        if !allowed_appointment_transitions(appointment.status).contains(&target) {
            return Err(CrmError::InvalidTransition {
                entity: "appointment",
                from: appointment.status.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }

        let entity = self
            .appointments
            .update(
                appointment.id,
                &json!({
                    "status": target,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        info!(appointment = %appointment.id, status = target.as_str(), "appointment transitioned");
        let side_effect = self.logger.record_for(entity.lead_id, kind, description).await;
        Ok(MutationOutcome { entity, side_effect })
    }

    pub async fn transition_lead(
        &self,
        lead: &Lead,
        target: LeadStatus,
    ) -> Result<MutationOutcome<Lead>, CrmError> {
        let current = LeadStatus::parse(&lead.status).ok_or_else(|| {
            CrmError::Validation(format!("lead: unknown status label '{}'", lead.status))
        })?;
        let kind = match target {
            LeadStatus::Won | LeadStatus::Lost => ActivityKind::Complete,
            _ => ActivityKind::Update,
        };
        let description = format!(
            "lead moved from {} to {}",
            current.as_str(),
            target.as_str()
        );

        if target == current {
            let side_effect = self.logger.record(lead.id, kind, description, None).await;
            return Ok(MutationOutcome {
                entity: lead.clone(),
                side_effect,
            });
        }
        if !allowed_lead_transitions(current).contains(&target) {
            return Err(CrmError::InvalidTransition {
                entity: "lead",
                from: current.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }

        let entity = self
            .leads
            .update(
                lead.id,
                &json!({
                    "status": target.as_str(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        info!(lead = %lead.id, status = target.as_str(), "lead transitioned");
        let side_effect = self.logger.record(lead.id, kind, description, None).await;
        Ok(MutationOutcome { entity, side_effect })
    }

    pub async fn transition_deal(
        &self,
        deal: &Deal,
        target: DealStatus,
    ) -> Result<MutationOutcome<Deal>, CrmError> {
        let description = format!("deal '{}' closed as {}", deal.name, target.as_str());

        if target == deal.status {
            let side_effect = self
                .logger
                .record_for(deal.lead_id, ActivityKind::Complete, description)
                .await;
            return Ok(MutationOutcome {
                entity: deal.clone(),
                side_effect,
            });
        }
        if !allowed_deal_transitions(deal.status).contains(&target) {
            return Err(CrmError::InvalidTransition {
                entity: "deal",
                from: deal.status.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }

        let entity = self
            .deals
            .update(
                deal.id,
                &json!({
                    "status": target,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        info!(deal = %deal.id, status = target.as_str(), "deal transitioned");
        let side_effect = self
            .logger
            .record_for(entity.lead_id, ActivityKind::Complete, description)
            .await;
        Ok(MutationOutcome { entity, side_effect })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_terminal_states_are_closed() {
        assert_eq!(
            allowed_appointment_transitions(AppointmentStatus::Scheduled),
            &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
        );
        assert!(allowed_appointment_transitions(AppointmentStatus::Completed).is_empty());
        assert!(allowed_appointment_transitions(AppointmentStatus::Cancelled).is_empty());
    }

    #[test]
    fn lead_moves_forward_only() {
        assert!(allowed_lead_transitions(LeadStatus::New).contains(&LeadStatus::Won));
        assert!(allowed_lead_transitions(LeadStatus::Qualified).contains(&LeadStatus::Negotiation));
        assert!(!allowed_lead_transitions(LeadStatus::Negotiation).contains(&LeadStatus::Qualified));
        assert!(allowed_lead_transitions(LeadStatus::Won).is_empty());
        assert!(allowed_lead_transitions(LeadStatus::Lost).is_empty());
    }

    #[test]
    fn deal_closes_once() {
        assert_eq!(
            allowed_deal_transitions(DealStatus::Active),
            &[DealStatus::Won, DealStatus::Lost]
        );
        assert!(allowed_deal_transitions(DealStatus::Won).is_empty());
    }
}
