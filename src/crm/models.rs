//! Typed entity shapes for the five CRM tables.
//!
//! Each entity implements [`StoreModel`], which ties it to its table and
//! carries the row-level validation and normalization hooks the repository
//! runs before any remote call. Inputs and patches keep foreign keys as
//! strings because the UI ships sentinel values (`"none"`, `"unassigned"`)
//! that must be nulled out before they reach the store.

use chrono::{DateTime, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::CrmError;
use crate::store::{Row, StoreError, Table};

/// Decode a store row into a typed entity. Single decode path for every
/// table; the closed [`Entity`] enum is the only union shape in the crate.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(StoreError::Decode)
}

/// Serialize an input or patch into the flat row shape the store accepts.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value).map_err(StoreError::Decode)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Decode(serde::de::Error::custom(format!(
            "expected row object, got {other}"
        )))),
    }
}

/// Ties an entity to its table and to the pre-flight checks the repository
/// applies before talking to the store.
pub trait StoreModel: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;
    const NAME: &'static str;

    fn id(&self) -> Uuid;

    /// Required-field checks for a create. Runs before any remote call.
    fn validate_insert(_row: &Row) -> Result<(), CrmError> {
        Ok(())
    }

    /// Invariant checks on the fields a patch actually carries.
    fn validate_patch(_row: &Row) -> Result<(), CrmError> {
        Ok(())
    }

    /// True when a patch touches only part of a cross-field invariant, so
    /// the repository must fetch the stored row and validate the merge.
    fn patch_needs_stored_row(_patch: &Row) -> bool {
        false
    }

    /// Cross-field invariants on a stored row with a patch merged in.
    fn validate_merged(_row: &Row) -> Result<(), CrmError> {
        Ok(())
    }

    /// Canonicalize a row in place: sentinel foreign keys, field aliases,
    /// all-day time snapping.
    fn normalize(_row: &mut Row) {}
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Open,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    #[default]
    Active,
    Won,
    Lost,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Active => "active",
            DealStatus::Won => "won",
            DealStatus::Lost => "lost",
        }
    }
}

/// Lead lifecycle states. The store holds free-form labels (deployments are
/// seeded with localized ones), so this parses rather than deserializes:
/// `"جديد"` is the localized alias the default configuration writes for a
/// fresh lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    New,
    Qualified,
    Negotiation,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "new" | "جديد" => Some(LeadStatus::New),
            "qualified" => Some(LeadStatus::Qualified),
            "negotiation" => Some(LeadStatus::Negotiation),
            "won" => Some(LeadStatus::Won),
            "lost" => Some(LeadStatus::Lost),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Negotiation => "negotiation",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Note,
    Call,
    Email,
    Meeting,
    Task,
    Create,
    Update,
    Delete,
    Complete,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Note => "note",
            ActivityKind::Call => "call",
            ActivityKind::Email => "email",
            ActivityKind::Meeting => "meeting",
            ActivityKind::Task => "task",
            ActivityKind::Create => "create",
            ActivityKind::Update => "update",
            ActivityKind::Delete => "delete",
            ActivityKind::Complete => "complete",
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Lifecycle label. The UI calls this `stage`; both names read the same
    /// underlying column and must never diverge.
    #[serde(alias = "stage")]
    pub status: String,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// UI-facing alias of [`Lead::status`].
    pub fn stage(&self) -> &str {
        &self.status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub related_deal_id: Option<Uuid>,
    #[serde(default)]
    pub related_ticket_id: Option<Uuid>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub reminder_minutes: Option<i32>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable log entry tied to a lead. Only `completed_at` is ever set after
/// creation; rows are otherwise append-and-delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub kind: ActivityKind,
    pub description: String,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub status: DealStatus,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Closed union over everything this subsystem stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    Lead(Lead),
    Deal(Deal),
    Appointment(Appointment),
    Task(Task),
    Activity(Activity),
}

impl Entity {
    pub fn id(&self) -> Uuid {
        match self {
            Entity::Lead(e) => e.id,
            Entity::Deal(e) => e.id,
            Entity::Appointment(e) => e.id,
            Entity::Task(e) => e.id,
            Entity::Activity(e) => e.id,
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Entity::Lead(_) => Table::Leads,
            Entity::Deal(_) => Table::Deals,
            Entity::Appointment(_) => Table::Appointments,
            Entity::Task(_) => Table::Tasks,
            Entity::Activity(_) => Table::LeadActivities,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and patches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewLead {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Owner reference as the UI ships it; sentinels normalize to null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// UI alias for `status`; folded into it during normalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_ticket_id: Option<String>,
    pub is_all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<i32>,
    pub participants: Vec<Uuid>,
}

impl NewAppointment {
    pub fn new(title: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            start_time,
            end_time,
            status: AppointmentStatus::Scheduled,
            lead_id: None,
            company_id: None,
            client_id: None,
            owner_id: None,
            related_deal_id: None,
            related_ticket_id: None,
            is_all_day: false,
            reminder_minutes: None,
            participants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewActivity {
    pub lead_id: Uuid,
    pub kind: ActivityKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewDeal {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub status: DealStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn field_str<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

fn field_blank(row: &Row, key: &str) -> bool {
    field_str(row, key).map(|s| s.trim().is_empty()).unwrap_or(true)
}

fn field_datetime(row: &Row, key: &str) -> Option<DateTime<Utc>> {
    field_str(row, key)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn field_flag(row: &Row, key: &str) -> bool {
    row.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn require(row: &Row, entity: &str, key: &str) -> Result<(), CrmError> {
    if field_blank(row, key) {
        return Err(CrmError::Validation(format!("{entity}: {key} is required")));
    }
    Ok(())
}

/// Null out UI sentinel values on string-valued foreign keys so they never
/// hit the store's FK constraints.
fn null_sentinels(row: &mut Row, columns: &[&str]) {
    for column in columns {
        let is_sentinel = matches!(
            field_str(row, column),
            Some("none") | Some("unassigned")
        );
        if is_sentinel {
            row.insert((*column).to_string(), Value::Null);
        }
    }
}

/// When both timestamps are present, reject an end that does not come after
/// the start — unless the appointment is all-day, in which case both are
/// snapped to day boundaries instead.
fn check_appointment_times(row: &Row) -> Result<(), CrmError> {
    if field_flag(row, "is_all_day") {
        return Ok(());
    }
    if let (Some(start), Some(end)) = (
        field_datetime(row, "start_time"),
        field_datetime(row, "end_time"),
    ) {
        if end <= start {
            return Err(CrmError::Validation(
                "appointment: end_time must be after start_time".to_string(),
            ));
        }
    }
    Ok(())
}

fn snap_all_day_times(row: &mut Row) {
    if !field_flag(row, "is_all_day") {
        return;
    }
    let day_start = NaiveTime::from_hms_opt(0, 0, 0);
    let day_end = NaiveTime::from_hms_opt(23, 59, 59);
    if let (Some(start), Some(floor)) = (field_datetime(row, "start_time"), day_start) {
        let snapped = start.date_naive().and_time(floor).and_utc();
        row.insert("start_time".to_string(), Value::String(snapped.to_rfc3339()));
    }
    if let (Some(end), Some(ceil)) = (field_datetime(row, "end_time"), day_end) {
        let snapped = end.date_naive().and_time(ceil).and_utc();
        row.insert("end_time".to_string(), Value::String(snapped.to_rfc3339()));
    }
}

// ---------------------------------------------------------------------------
// StoreModel impls
// ---------------------------------------------------------------------------

impl StoreModel for Lead {
    const TABLE: Table = Table::Leads;
    const NAME: &'static str = "lead";

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_insert(row: &Row) -> Result<(), CrmError> {
        require(row, Self::NAME, "first_name")?;
        require(row, Self::NAME, "last_name")?;
        require(row, Self::NAME, "email")?;
        Ok(())
    }

    fn normalize(row: &mut Row) {
        // `stage` and `status` are one value under two names; the column is
        // `status`, so the alias folds into it before the row is sent.
        if let Some(stage) = row.remove("stage") {
            row.insert("status".to_string(), stage);
        }
        null_sentinels(row, &["assigned_to"]);
    }
}

impl StoreModel for Appointment {
    const TABLE: Table = Table::Appointments;
    const NAME: &'static str = "appointment";

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_insert(row: &Row) -> Result<(), CrmError> {
        require(row, Self::NAME, "title")?;
        require(row, Self::NAME, "start_time")?;
        require(row, Self::NAME, "end_time")?;
        check_appointment_times(row)
    }

    fn validate_patch(row: &Row) -> Result<(), CrmError> {
        if row.contains_key("title") {
            require(row, Self::NAME, "title")?;
        }
        check_appointment_times(row)
    }

    fn patch_needs_stored_row(patch: &Row) -> bool {
        patch.contains_key("start_time") != patch.contains_key("end_time")
    }

    fn validate_merged(row: &Row) -> Result<(), CrmError> {
        check_appointment_times(row)
    }

    fn normalize(row: &mut Row) {
        null_sentinels(
            row,
            &[
                "lead_id",
                "company_id",
                "client_id",
                "owner_id",
                "related_deal_id",
                "related_ticket_id",
            ],
        );
        snap_all_day_times(row);
    }
}

impl StoreModel for Task {
    const TABLE: Table = Table::Tasks;
    const NAME: &'static str = "task";

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_insert(row: &Row) -> Result<(), CrmError> {
        require(row, Self::NAME, "title")
    }

    fn validate_patch(row: &Row) -> Result<(), CrmError> {
        if row.contains_key("title") {
            require(row, Self::NAME, "title")?;
        }
        Ok(())
    }

    fn normalize(row: &mut Row) {
        null_sentinels(row, &["assigned_to", "lead_id"]);
    }
}

impl StoreModel for Activity {
    const TABLE: Table = Table::LeadActivities;
    const NAME: &'static str = "activity";

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_insert(row: &Row) -> Result<(), CrmError> {
        // an activity cannot exist unqualified
        if row.get("lead_id").map(Value::is_null).unwrap_or(true) {
            return Err(CrmError::Validation(
                "activity: lead_id is required".to_string(),
            ));
        }
        require(row, Self::NAME, "kind")
    }
}

impl StoreModel for Deal {
    const TABLE: Table = Table::Deals;
    const NAME: &'static str = "deal";

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_insert(row: &Row) -> Result<(), CrmError> {
        require(row, Self::NAME, "name")
    }

    fn normalize(row: &mut Row) {
        null_sentinels(row, &["owner_id", "company_id", "contact_id", "lead_id"]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn lead_stage_is_status_alias() {
        let lead: Lead = from_row(row(json!({
            "id": Uuid::new_v4(),
            "first_name": "Ahmed",
            "last_name": "Ali",
            "email": "a@x.com",
            "stage": "جديد",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        })))
        .unwrap();
        assert_eq!(lead.status, "جديد");
        assert_eq!(lead.stage(), lead.status);
    }

    #[test]
    fn lead_normalize_folds_stage_into_status() {
        let mut patch = row(json!({ "stage": "qualified" }));
        Lead::normalize(&mut patch);
        assert_eq!(patch.get("status"), Some(&json!("qualified")));
        assert!(!patch.contains_key("stage"));
    }

    #[test]
    fn sentinel_owner_becomes_null() {
        let mut patch = row(json!({ "assigned_to": "unassigned" }));
        Lead::normalize(&mut patch);
        assert_eq!(patch.get("assigned_to"), Some(&Value::Null));

        let mut kept = row(json!({ "assigned_to": Uuid::new_v4() }));
        Lead::normalize(&mut kept);
        assert!(kept.get("assigned_to").unwrap().is_string());
    }

    #[test]
    fn appointment_rejects_inverted_times() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let appt = row(json!({
            "title": "Demo",
            "start_time": start.to_rfc3339(),
            "end_time": (start - chrono::Duration::hours(1)).to_rfc3339(),
        }));
        assert!(matches!(
            Appointment::validate_insert(&appt),
            Err(CrmError::Validation(_))
        ));
    }

    #[test]
    fn all_day_appointment_snaps_to_day_bounds() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap();
        let mut appt = row(json!({
            "title": "Offsite",
            "is_all_day": true,
            "start_time": start.to_rfc3339(),
            "end_time": start.to_rfc3339(),
        }));
        // inverted times are fine for all-day rows; they get snapped instead
        Appointment::validate_insert(&appt).unwrap();
        Appointment::normalize(&mut appt);
        let snapped_start = field_datetime(&appt, "start_time").unwrap();
        let snapped_end = field_datetime(&appt, "end_time").unwrap();
        assert_eq!(snapped_start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(snapped_end, Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap());
    }

    #[test]
    fn one_sided_time_patch_needs_the_stored_row() {
        assert!(Appointment::patch_needs_stored_row(&row(json!({
            "end_time": "2026-03-01T09:00:00Z",
        }))));
        assert!(!Appointment::patch_needs_stored_row(&row(json!({
            "start_time": "2026-03-01T09:00:00Z",
            "end_time": "2026-03-01T10:00:00Z",
        }))));
        assert!(!Appointment::patch_needs_stored_row(&row(json!({
            "status": "cancelled",
        }))));
    }

    #[test]
    fn appointment_requires_title_and_times() {
        let err = Appointment::validate_insert(&row(json!({ "title": "  " }))).unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn activity_requires_lead() {
        let err = Activity::validate_insert(&row(json!({ "kind": "note" }))).unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn lead_status_parses_localized_alias() {
        assert_eq!(LeadStatus::parse("جديد"), Some(LeadStatus::New));
        assert_eq!(LeadStatus::parse("negotiation"), Some(LeadStatus::Negotiation));
        assert_eq!(LeadStatus::parse("archived"), None);
    }

    #[test]
    fn entity_union_is_tagged() {
        let task: Task = from_row(row(json!({
            "id": Uuid::new_v4(),
            "title": "Call",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        })))
        .unwrap();
        let entity = Entity::Task(task.clone());
        assert_eq!(entity.table(), Table::Tasks);
        assert_eq!(entity.id(), task.id);
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json.get("entity"), Some(&json!("task")));
    }
}
