#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::{OffsetDateTime, UtcOffset};
use ulid::Ulid;

pub type DateTimeUtc = OffsetDateTime;

pub const DEFAULT_DOCTOR_ID: &str = "current-doctor";
pub const DEFAULT_SYSTEM_AUTHOR: &str = "system";
pub const DEFAULT_DENIAL_REASON: &str = "You do not have permission to perform this action.";
pub const DENIAL_REASON_PREFIX: &str = "permissions.denied.";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum AccessError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AccessError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Receptionist,
}

impl Role {
    pub const ALL: [Role; 4] = [Self::Admin, Self::Doctor, Self::Nurse, Self::Receptionist];

    /// Roles a user can switch to from the session controls.
    pub const SESSION_ROLES: [Role; 2] = [Self::Admin, Self::Doctor];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::Receptionist => "receptionist",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "doctor" => Some(Self::Doctor),
            "nurse" => Some(Self::Nurse),
            "receptionist" => Some(Self::Receptionist),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_session_role(self) -> bool {
        Self::SESSION_ROLES.contains(&self)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Permission {
    #[serde(rename = "canViewPatients")]
    ViewPatients,
    #[serde(rename = "canCreatePatients")]
    CreatePatients,
    #[serde(rename = "canEditPatients")]
    EditPatients,
    #[serde(rename = "canDeletePatients")]
    DeletePatients,
    #[serde(rename = "canAccessRecords")]
    AccessRecords,
    #[serde(rename = "canEditRecords")]
    EditRecords,
    #[serde(rename = "canManageAppointments")]
    ManageAppointments,
    #[serde(rename = "canUseAIScheduling")]
    UseAiScheduling,
    #[serde(rename = "canUseAICalls")]
    UseAiCalls,
    #[serde(rename = "canUseAISummaries")]
    UseAiSummaries,
    #[serde(rename = "canUseAITranscription")]
    UseAiTranscription,
    #[serde(rename = "canCreateReferrals")]
    CreateReferrals,
    #[serde(rename = "canSendMessages")]
    SendMessages,
    #[serde(rename = "canViewStatistics")]
    ViewStatistics,
    #[serde(rename = "canManagePersonnel")]
    ManagePersonnel,
    #[serde(rename = "canConfigureWorkflows")]
    ConfigureWorkflows,
    #[serde(rename = "canApproveWorkflows")]
    ApproveWorkflows,
    #[serde(rename = "canViewAIActivities")]
    ViewAiActivities,
    #[serde(rename = "canConfigureSystem")]
    ConfigureSystem,
}

impl Permission {
    pub const ALL: [Permission; 19] = [
        Self::ViewPatients,
        Self::CreatePatients,
        Self::EditPatients,
        Self::DeletePatients,
        Self::AccessRecords,
        Self::EditRecords,
        Self::ManageAppointments,
        Self::UseAiScheduling,
        Self::UseAiCalls,
        Self::UseAiSummaries,
        Self::UseAiTranscription,
        Self::CreateReferrals,
        Self::SendMessages,
        Self::ViewStatistics,
        Self::ManagePersonnel,
        Self::ConfigureWorkflows,
        Self::ApproveWorkflows,
        Self::ViewAiActivities,
        Self::ConfigureSystem,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewPatients => "canViewPatients",
            Self::CreatePatients => "canCreatePatients",
            Self::EditPatients => "canEditPatients",
            Self::DeletePatients => "canDeletePatients",
            Self::AccessRecords => "canAccessRecords",
            Self::EditRecords => "canEditRecords",
            Self::ManageAppointments => "canManageAppointments",
            Self::UseAiScheduling => "canUseAIScheduling",
            Self::UseAiCalls => "canUseAICalls",
            Self::UseAiSummaries => "canUseAISummaries",
            Self::UseAiTranscription => "canUseAITranscription",
            Self::CreateReferrals => "canCreateReferrals",
            Self::SendMessages => "canSendMessages",
            Self::ViewStatistics => "canViewStatistics",
            Self::ManagePersonnel => "canManagePersonnel",
            Self::ConfigureWorkflows => "canConfigureWorkflows",
            Self::ApproveWorkflows => "canApproveWorkflows",
            Self::ViewAiActivities => "canViewAIActivities",
            Self::ConfigureSystem => "canConfigureSystem",
        }
    }

    /// Exact, case-sensitive match on the wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == value)
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    Dashboard,
    Patients,
    Agenda,
    Records,
    IaActivities,
    Statistics,
    Messages,
    Personnel,
    Configuration,
}

impl Page {
    /// Pages selectable by the leading section of a pathname.
    pub const ROUTED: [Page; 8] = [
        Self::Patients,
        Self::Agenda,
        Self::Records,
        Self::IaActivities,
        Self::Statistics,
        Self::Messages,
        Self::Personnel,
        Self::Configuration,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Patients => "patients",
            Self::Agenda => "agenda",
            Self::Records => "records",
            Self::IaActivities => "ia-activities",
            Self::Statistics => "statistics",
            Self::Messages => "messages",
            Self::Personnel => "personnel",
            Self::Configuration => "configuration",
        }
    }
}

/// Schema-less value carried in activity details and step configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

pub type FieldMap = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ActivityContext {
    pub current_page: Page,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<String>,
    pub user_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ActivityId(pub Ulid);

impl ActivityId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Ulid::from_string(value).ok().map(Self)
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ActivityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityType {
    Call,
    Summary,
    Schedule,
    Reminder,
    FollowUp,
    Transcription,
    Referral,
    PatientIntake,
}

impl ActivityType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Summary => "summary",
            Self::Schedule => "schedule",
            Self::Reminder => "reminder",
            Self::FollowUp => "follow-up",
            Self::Transcription => "transcription",
            Self::Referral => "referral",
            Self::PatientIntake => "patient-intake",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityStatus {
    InProgress,
    Completed,
    Failed,
}

impl ActivityStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` is terminal; `failed` may only be retried.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
                | (Self::Failed, Self::InProgress)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: ActivityId,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub timestamp: String,
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: FieldMap,
}

/// Input for appending an activity; identity and status are assigned by the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub details: FieldMap,
}

impl NewActivity {
    #[must_use]
    pub fn new(
        activity_type: ActivityType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            activity_type,
            title: title.into(),
            description: description.into(),
            timestamp: None,
            details: FieldMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Trigger,
    Condition,
    Action,
    Approval,
}

impl StepType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Condition => "condition",
            Self::Action => "action",
            Self::Approval => "approval",
        }
    }
}

/// Canvas coordinates; carried for the editor only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkflowStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: FieldMap,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub connections: Vec<String>,
}

impl WorkflowStep {
    #[must_use]
    pub fn new(id: &str, step_type: StepType, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            step_type,
            name: name.to_string(),
            description: description.to_string(),
            config: FieldMap::new(),
            position: Position::default(),
            connections: Vec::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    #[must_use]
    pub fn config(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn connect(mut self, target: &str) -> Self {
        self.connections.push(target.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Workflow {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub triggers: BTreeSet<String>,
    #[serde(default)]
    pub approval_required: bool,
    #[serde(default)]
    pub created_by: String,
    #[serde(default = "now_utc", with = "time::serde::rfc3339")]
    pub created_at: DateTimeUtc,
    #[serde(default = "now_utc", with = "time::serde::rfc3339")]
    pub updated_at: DateTimeUtc,
}

impl Workflow {
    #[must_use]
    pub fn has_trigger_step(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.step_type == StepType::Trigger)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Clinical,
    Administrative,
    Communication,
}

/// Workflow body stamped into new instances by a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowBlueprint {
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub steps: Vec<WorkflowStep>,
    pub triggers: BTreeSet<String>,
    pub approval_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    pub workflow: WorkflowBlueprint,
}

/// Session-wide settings resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub initial_role: Role,
    pub doctor_id: String,
    pub system_author: String,
    pub default_denial_reason: String,
    /// Overrides keyed `permissions.denied.<permission>.<role>`.
    pub denial_reasons: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_role: Role::Admin,
            doctor_id: DEFAULT_DOCTOR_ID.to_string(),
            system_author: DEFAULT_SYSTEM_AUTHOR.to_string(),
            default_denial_reason: DEFAULT_DENIAL_REASON.to_string(),
            denial_reasons: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Validates identity strings and denial reason overrides.
    ///
    /// # Errors
    /// Returns [`AccessError::Configuration`] when the initial role is not a
    /// session role, a required string is blank, or a reason override uses a
    /// malformed key.
    pub fn validate(&self) -> Result<(), AccessError> {
        let role = self.initial_role;
        if !role.is_session_role() {
            return Err(AccessError::Configuration(format!(
                "initial_role {role} is not a session role"
            )));
        }

        for (name, value) in [
            ("doctor_id", &self.doctor_id),
            ("system_author", &self.system_author),
            ("default_denial_reason", &self.default_denial_reason),
        ] {
            if value.trim().is_empty() {
                return Err(AccessError::Configuration(format!(
                    "{name} MUST be non-empty"
                )));
            }
        }

        for (key, reason) in &self.denial_reasons {
            let Some(rest) = key.strip_prefix(DENIAL_REASON_PREFIX) else {
                return Err(AccessError::Configuration(format!(
                    "denial reason key {key} MUST start with {DENIAL_REASON_PREFIX}"
                )));
            };
            let Some((permission, role)) = rest.split_once('.') else {
                return Err(AccessError::Configuration(format!(
                    "denial reason key {key} MUST name a permission and a role"
                )));
            };
            if Permission::parse(permission).is_none() {
                return Err(AccessError::Configuration(format!(
                    "denial reason key {key} names unknown permission {permission}"
                )));
            }
            if Role::parse(role).is_none() {
                return Err(AccessError::Configuration(format!(
                    "denial reason key {key} names unknown role {role}"
                )));
            }
            if reason.trim().is_empty() {
                return Err(AccessError::Configuration(format!(
                    "denial reason for {key} MUST be non-empty"
                )));
            }
        }

        Ok(())
    }

    /// Decodes and validates a session configuration from JSON.
    ///
    /// # Errors
    /// Returns [`AccessError::Configuration`] when decoding fails or the
    /// decoded values are invalid.
    pub fn from_json(value: &Value) -> Result<Self, AccessError> {
        let config: Self = serde_json::from_value(value.clone()).map_err(|err| {
            AccessError::Configuration(format!("invalid session config payload: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Builds the catalog key for a denial reason.
#[must_use]
pub fn denial_reason_key(permission: &str, role: Role) -> String {
    format!("{DENIAL_REASON_PREFIX}{permission}.{}", role.as_str())
}

#[must_use]
pub fn now_utc() -> DateTimeUtc {
    OffsetDateTime::now_utc().to_offset(UtcOffset::UTC)
}

/// Formats a timestamp as RFC3339 after normalizing to UTC.
///
/// # Errors
/// Returns [`AccessError::Validation`] when formatting fails.
pub fn format_rfc3339(value: DateTimeUtc) -> Result<String, AccessError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| {
            AccessError::Validation(format!("failed to format RFC3339 timestamp: {err}"))
        })
}

/// Milliseconds since the Unix epoch, saturating on overflow.
#[must_use]
pub fn unix_millis(value: DateTimeUtc) -> i64 {
    i64::try_from(value.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash a JSON value with stable `serde_json` serialization + SHA-256.
#[must_use]
pub fn hash_json(value: &Value) -> String {
    hash_bytes(value.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    #[test]
    fn permission_wire_names_round_trip_through_parse() {
        for permission in Permission::ALL {
            assert_eq!(Permission::parse(permission.as_str()), Some(permission));
            let encoded = must_ok(serde_json::to_value(permission));
            assert_eq!(encoded, json!(permission.as_str()));
        }
        assert_eq!(Permission::parse("canmanagepersonnel"), None);
        assert_eq!(Permission::parse("create_patient"), None);
    }

    #[test]
    fn role_parse_is_case_insensitive_and_closed() {
        assert_eq!(Role::parse("Doctor"), Some(Role::Doctor));
        assert_eq!(Role::parse(" ADMIN "), Some(Role::Admin));
        assert_eq!(Role::parse("janitor"), None);
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        use ActivityStatus::{Completed, Failed, InProgress};

        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(Failed.can_transition_to(InProgress));

        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(InProgress));
        assert!(Completed.is_terminal());
    }

    #[test]
    fn field_values_decode_untagged() {
        let map: FieldMap = must_ok(serde_json::from_value(json!({
            "channel": "sms",
            "delay_hours": 24,
            "notify": true
        })));
        assert_eq!(map["channel"], FieldValue::Text("sms".to_string()));
        assert_eq!(map["delay_hours"], FieldValue::Number(24.0));
        assert_eq!(map["notify"], FieldValue::Flag(true));
    }

    #[test]
    fn workflow_defaults_fill_missing_metadata() {
        let workflow: Workflow = must_ok(serde_json::from_value(json!({
            "name": "Draft",
            "steps": [
                {"id": "t1", "type": "trigger", "name": "Start", "connections": ["a1"]},
                {"id": "a1", "type": "action", "name": "Act"}
            ]
        })));
        assert!(workflow.id.is_empty());
        assert!(!workflow.is_active);
        assert!(workflow.has_trigger_step());
        assert_eq!(workflow.steps[1].position, Position::default());
    }

    #[test]
    fn session_config_defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn session_config_rejects_bad_reason_keys() {
        let result = SessionConfig::from_json(&json!({
            "denial_reasons": {"denied.canManagePersonnel.doctor": "no"}
        }));
        assert!(matches!(result, Err(AccessError::Configuration(_))));

        let result = SessionConfig::from_json(&json!({
            "denial_reasons": {"permissions.denied.canFly.doctor": "no"}
        }));
        assert!(matches!(result, Err(AccessError::Configuration(_))));

        let result = SessionConfig::from_json(&json!({"doctor_id": "  "}));
        assert!(matches!(result, Err(AccessError::Configuration(_))));
    }

    #[test]
    fn session_config_rejects_non_session_initial_role() {
        for role in ["nurse", "receptionist"] {
            let result = SessionConfig::from_json(&json!({ "initial_role": role }));
            assert!(matches!(result, Err(AccessError::Configuration(_))), "{role}");
        }
        assert!(Role::Doctor.is_session_role());
        assert!(!Role::Nurse.is_session_role());
    }

    #[test]
    fn session_config_accepts_overrides() {
        let config = must_ok(SessionConfig::from_json(&json!({
            "initial_role": "doctor",
            "doctor_id": "dr-42",
            "denial_reasons": {
                "permissions.denied.canManagePersonnel.doctor": "Ask an administrator."
            }
        })));
        assert_eq!(config.initial_role, Role::Doctor);
        assert_eq!(config.doctor_id, "dr-42");
        assert_eq!(config.system_author, DEFAULT_SYSTEM_AUTHOR);
    }

    #[test]
    fn hash_json_is_stable() {
        let value = json!({"b": 1, "a": [true, "x"]});
        assert_eq!(hash_json(&value), hash_json(&value.clone()));
        assert_eq!(hash_json(&value).len(), 64);
    }
}
