//! Read-side merge of a lead's activities, tasks, and appointments into one
//! chronological sequence. Pure projection: nothing here ever writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::models::{Activity, Appointment, AppointmentStatus, Task, TaskStatus};
use super::repository::EntityRepository;
use super::CrmError;
use crate::store::Filter;

/// Origin of a timeline row, tagged for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineSource {
    Activity(Activity),
    Task(Task),
    Appointment(Appointment),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    /// The most relevant instant per kind: activity `created_at`, task
    /// `due_date` (falling back to `created_at`), appointment `start_time`.
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub source: TimelineSource,
}

pub struct TimelineAggregator {
    activities: Arc<EntityRepository<Activity>>,
    tasks: Arc<EntityRepository<Task>>,
    appointments: Arc<EntityRepository<Appointment>>,
}

impl TimelineAggregator {
    pub fn new(
        activities: Arc<EntityRepository<Activity>>,
        tasks: Arc<EntityRepository<Task>>,
        appointments: Arc<EntityRepository<Appointment>>,
    ) -> Self {
        Self {
            activities,
            tasks,
            appointments,
        }
    }

    /// Appointments reach a lead through either `lead_id` or `client_id`;
    /// fetch both sides and de-duplicate.
    async fn lead_appointments(&self, lead_id: Uuid) -> Result<Vec<Appointment>, CrmError> {
        let by_lead = self
            .appointments
            .list(&Filter::new().eq("lead_id", lead_id))
            .await?;
        let by_client = self
            .appointments
            .list(&Filter::new().eq("client_id", lead_id))
            .await?;
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(by_lead.len() + by_client.len());
        for appointment in by_lead.into_iter().chain(by_client) {
            if seen.insert(appointment.id) {
                merged.push(appointment);
            }
        }
        Ok(merged)
    }

    /// Full history, most recent first.
    pub async fn build_timeline(&self, lead_id: Uuid) -> Result<Vec<TimelineEntry>, CrmError> {
        let filter = Filter::new().eq("lead_id", lead_id);
        let activities = self.activities.list(&filter).await?;
        let tasks = self.tasks.list(&filter).await?;
        let appointments = self.lead_appointments(lead_id).await?;

        let mut entries: Vec<TimelineEntry> = Vec::new();
        entries.extend(activities.into_iter().map(|activity| TimelineEntry {
            timestamp: activity.created_at,
            source: TimelineSource::Activity(activity),
        }));
        entries.extend(tasks.into_iter().map(|task| TimelineEntry {
            timestamp: task.due_date.unwrap_or(task.created_at),
            source: TimelineSource::Task(task),
        }));
        entries.extend(appointments.into_iter().map(|appointment| TimelineEntry {
            timestamp: appointment.start_time,
            source: TimelineSource::Appointment(appointment),
        }));

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Future work only, soonest first: plannable activities not yet
    /// completed, open tasks with a due date, and scheduled appointments.
    pub async fn upcoming(&self, lead_id: Uuid) -> Result<Vec<TimelineEntry>, CrmError> {
        let now = Utc::now();
        let filter = Filter::new().eq("lead_id", lead_id);
        let activities = self.activities.list(&filter).await?;
        let tasks = self.tasks.list(&filter).await?;
        let appointments = self.lead_appointments(lead_id).await?;

        let mut entries: Vec<TimelineEntry> = Vec::new();
        entries.extend(
            activities
                .into_iter()
                .filter(|a| a.completed_at.is_none())
                .filter_map(|activity| {
                    activity.scheduled_at.map(|at| TimelineEntry {
                        timestamp: at,
                        source: TimelineSource::Activity(activity),
                    })
                }),
        );
        entries.extend(
            tasks
                .into_iter()
                .filter(|t| t.status == TaskStatus::Open)
                .filter_map(|task| {
                    task.due_date.map(|due| TimelineEntry {
                        timestamp: due,
                        source: TimelineSource::Task(task),
                    })
                }),
        );
        entries.extend(
            appointments
                .into_iter()
                .filter(|a| a.status == AppointmentStatus::Scheduled)
                .map(|appointment| TimelineEntry {
                    timestamp: appointment.start_time,
                    source: TimelineSource::Appointment(appointment),
                }),
        );

        entries.retain(|entry| entry.timestamp > now);
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::repository::FallbackStore;
    use crate::store::{DataStore, MemoryStore, Row, Table};
    use chrono::Duration;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn repo<T: crate::crm::models::StoreModel>(store: Arc<MemoryStore>) -> Arc<EntityRepository<T>> {
        Arc::new(EntityRepository::new(
            store,
            Arc::new(FallbackStore::new()),
            CancellationToken::new(),
        ))
    }

    fn aggregator(store: Arc<MemoryStore>) -> TimelineAggregator {
        TimelineAggregator::new(
            repo::<Activity>(store.clone()),
            repo::<Task>(store.clone()),
            repo::<Appointment>(store),
        )
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn seed_activity(
        store: &MemoryStore,
        lead_id: Uuid,
        created_at: DateTime<Utc>,
        scheduled_at: Option<DateTime<Utc>>,
    ) {
        store
            .insert(
                Table::LeadActivities,
                row(json!({
                    "id": Uuid::new_v4(),
                    "lead_id": lead_id,
                    "kind": "note",
                    "description": "noted",
                    "created_at": created_at.to_rfc3339(),
                    "scheduled_at": scheduled_at.map(|t| t.to_rfc3339()),
                })),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn default_view_is_most_recent_first() {
        let store = Arc::new(MemoryStore::new());
        let lead_id = Uuid::new_v4();
        let base = Utc::now();
        let t3 = base - Duration::days(3);
        let t2 = base - Duration::days(2);
        let t1 = base - Duration::days(1);
        // insert out of order on purpose
        seed_activity(&store, lead_id, t2, None).await;
        seed_activity(&store, lead_id, t1, None).await;
        seed_activity(&store, lead_id, t3, None).await;

        let timeline = aggregator(store).build_timeline(lead_id).await.unwrap();
        let stamps: Vec<_> = timeline.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![t1, t2, t3]);
    }

    #[tokio::test]
    async fn merge_tags_each_origin_and_uses_per_kind_timestamps() {
        let store = Arc::new(MemoryStore::new());
        let lead_id = Uuid::new_v4();
        let base = Utc::now();

        seed_activity(&store, lead_id, base - Duration::hours(3), None).await;
        store
            .insert(
                Table::Tasks,
                row(json!({
                    "id": Uuid::new_v4(),
                    "title": "Send proposal",
                    "lead_id": lead_id,
                    "status": "open",
                    "due_date": (base - Duration::hours(1)).to_rfc3339(),
                    "created_at": (base - Duration::days(2)).to_rfc3339(),
                })),
            )
            .await
            .unwrap();
        store
            .insert(
                Table::Appointments,
                row(json!({
                    "id": Uuid::new_v4(),
                    "title": "Demo",
                    "lead_id": lead_id,
                    "status": "scheduled",
                    "start_time": (base - Duration::hours(2)).to_rfc3339(),
                    "end_time": (base - Duration::hours(1)).to_rfc3339(),
                })),
            )
            .await
            .unwrap();

        let timeline = aggregator(store).build_timeline(lead_id).await.unwrap();
        assert_eq!(timeline.len(), 3);
        // task sorts by due date, not creation date
        assert!(matches!(timeline[0].source, TimelineSource::Task(_)));
        assert!(matches!(timeline[1].source, TimelineSource::Appointment(_)));
        assert!(matches!(timeline[2].source, TimelineSource::Activity(_)));
    }

    #[tokio::test]
    async fn appointments_linked_via_client_id_appear_once() {
        let store = Arc::new(MemoryStore::new());
        let lead_id = Uuid::new_v4();
        let base = Utc::now();
        store
            .insert(
                Table::Appointments,
                row(json!({
                    "id": Uuid::new_v4(),
                    "title": "Review",
                    "lead_id": lead_id,
                    "client_id": lead_id,
                    "status": "scheduled",
                    "start_time": base.to_rfc3339(),
                    "end_time": (base + Duration::hours(1)).to_rfc3339(),
                })),
            )
            .await
            .unwrap();

        let timeline = aggregator(store).build_timeline(lead_id).await.unwrap();
        assert_eq!(timeline.len(), 1);
    }

    #[tokio::test]
    async fn upcoming_is_ascending_future_and_skips_closed_records() {
        let store = Arc::new(MemoryStore::new());
        let lead_id = Uuid::new_v4();
        let base = Utc::now();

        // past follow-up: excluded
        seed_activity(&store, lead_id, base - Duration::days(2), Some(base - Duration::days(1)))
            .await;
        // future follow-up: included
        seed_activity(&store, lead_id, base, Some(base + Duration::days(3))).await;
        // cancelled appointment: excluded
        store
            .insert(
                Table::Appointments,
                row(json!({
                    "id": Uuid::new_v4(),
                    "title": "Cancelled sync",
                    "lead_id": lead_id,
                    "status": "cancelled",
                    "start_time": (base + Duration::days(1)).to_rfc3339(),
                    "end_time": (base + Duration::days(1) + Duration::hours(1)).to_rfc3339(),
                })),
            )
            .await
            .unwrap();
        // scheduled appointment: included, sorts before the follow-up
        store
            .insert(
                Table::Appointments,
                row(json!({
                    "id": Uuid::new_v4(),
                    "title": "Demo",
                    "lead_id": lead_id,
                    "status": "scheduled",
                    "start_time": (base + Duration::days(2)).to_rfc3339(),
                    "end_time": (base + Duration::days(2) + Duration::hours(1)).to_rfc3339(),
                })),
            )
            .await
            .unwrap();
        // completed task: excluded even with a future due date
        store
            .insert(
                Table::Tasks,
                row(json!({
                    "id": Uuid::new_v4(),
                    "title": "Done already",
                    "lead_id": lead_id,
                    "status": "completed",
                    "due_date": (base + Duration::days(5)).to_rfc3339(),
                })),
            )
            .await
            .unwrap();

        let upcoming = aggregator(store).upcoming(lead_id).await.unwrap();
        assert_eq!(upcoming.len(), 2);
        assert!(matches!(upcoming[0].source, TimelineSource::Appointment(_)));
        assert!(matches!(upcoming[1].source, TimelineSource::Activity(_)));
        assert!(upcoming[0].timestamp < upcoming[1].timestamp);
    }
}
