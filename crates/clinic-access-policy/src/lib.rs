#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use clinic_access_domain::{
    denial_reason_key, ActivityContext, Page, Permission, Role, SessionConfig,
    DEFAULT_DENIAL_REASON, DEFAULT_DOCTOR_ID,
};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Action-type aliases accepted by [`PermissionSet::can_perform_action`].
pub const ACTION_TYPE_PERMISSIONS: [(&str, Permission); 19] = [
    ("view_patient", Permission::ViewPatients),
    ("create_patient", Permission::CreatePatients),
    ("edit_patient", Permission::EditPatients),
    ("delete_patient", Permission::DeletePatients),
    ("view_records", Permission::AccessRecords),
    ("edit_record", Permission::EditRecords),
    ("schedule_appointment", Permission::ManageAppointments),
    ("ai_schedule", Permission::UseAiScheduling),
    ("ai_call", Permission::UseAiCalls),
    ("generate_summary", Permission::UseAiSummaries),
    ("transcribe", Permission::UseAiTranscription),
    ("create_referral", Permission::CreateReferrals),
    ("send_message", Permission::SendMessages),
    ("view_statistics", Permission::ViewStatistics),
    ("manage_personnel", Permission::ManagePersonnel),
    ("configure_workflow", Permission::ConfigureWorkflows),
    ("approve_workflow", Permission::ApproveWorkflows),
    ("view_ai_activities", Permission::ViewAiActivities),
    ("configure_system", Permission::ConfigureSystem),
];

#[must_use]
pub fn permission_for_action_type(action_type: &str) -> Option<Permission> {
    ACTION_TYPE_PERMISSIONS
        .iter()
        .find(|(name, _)| *name == action_type)
        .map(|(_, permission)| *permission)
}

/// Holds the acting role for the session.
#[derive(Debug)]
pub struct RoleStore {
    role: RwLock<Role>,
}

impl RoleStore {
    #[must_use]
    pub fn new(initial: Role) -> Self {
        Self {
            role: RwLock::new(initial),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        *self.role.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_role(&self, role: Role) {
        let mut guard = self.role.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *guard;
        if previous != role {
            tracing::info!(from = %previous, to = %role, "session role changed");
        }
        *guard = role;
    }
}

impl Default for RoleStore {
    fn default() -> Self {
        Self::new(Role::Admin)
    }
}

/// Capability verdicts derived from a role. Never mutated after construction.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PermissionSet {
    granted: BTreeSet<Permission>,
}

impl PermissionSet {
    /// The all-false baseline.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_role(role: Role) -> Self {
        let granted: &[Permission] = match role {
            Role::Admin => &[
                Permission::ViewPatients,
                Permission::CreatePatients,
                Permission::EditPatients,
                Permission::DeletePatients,
                Permission::ManageAppointments,
                Permission::UseAiScheduling,
                Permission::UseAiCalls,
                Permission::UseAiSummaries,
                Permission::SendMessages,
                Permission::ViewStatistics,
                Permission::ManagePersonnel,
                Permission::ConfigureWorkflows,
                Permission::ApproveWorkflows,
                Permission::ViewAiActivities,
                Permission::ConfigureSystem,
            ],
            Role::Doctor => &[
                Permission::ViewPatients,
                Permission::EditPatients,
                Permission::AccessRecords,
                Permission::EditRecords,
                Permission::ManageAppointments,
                Permission::UseAiScheduling,
                Permission::UseAiCalls,
                Permission::UseAiSummaries,
                Permission::UseAiTranscription,
                Permission::CreateReferrals,
                Permission::SendMessages,
                Permission::ViewStatistics,
                Permission::ApproveWorkflows,
                Permission::ViewAiActivities,
            ],
            Role::Nurse => &[
                Permission::ViewPatients,
                Permission::EditPatients,
                Permission::AccessRecords,
                Permission::ManageAppointments,
                Permission::UseAiTranscription,
                Permission::SendMessages,
                Permission::ViewAiActivities,
            ],
            Role::Receptionist => &[
                Permission::ViewPatients,
                Permission::CreatePatients,
                Permission::EditPatients,
                Permission::ManageAppointments,
                Permission::UseAiScheduling,
                Permission::UseAiCalls,
                Permission::SendMessages,
            ],
        };

        Self {
            granted: granted.iter().copied().collect(),
        }
    }

    /// Resolves a raw role name; unrecognized names get [`PermissionSet::none`].
    #[must_use]
    pub fn for_role_name(name: &str) -> Self {
        Role::parse(name).map_or_else(Self::none, Self::for_role)
    }

    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }

    /// Every permission paired with its verdict, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Permission, bool)> + '_ {
        Permission::ALL
            .into_iter()
            .map(|permission| (permission, self.allows(permission)))
    }

    /// Answers a point query by permission name or action-type alias.
    ///
    /// A real permission name always wins. Otherwise `action_type` (or the key
    /// itself when no action type is given) is looked up in
    /// [`ACTION_TYPE_PERMISSIONS`]; unmapped strings are denied.
    #[must_use]
    pub fn can_perform_action(&self, permission_key: &str, action_type: Option<&str>) -> bool {
        if let Some(permission) = Permission::parse(permission_key) {
            return self.allows(permission);
        }

        let alias = action_type.unwrap_or(permission_key);
        permission_for_action_type(alias).is_some_and(|permission| self.allows(permission))
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Permission::ALL.len()))?;
        for (permission, allowed) in self.iter() {
            map.serialize_entry(permission.as_str(), &allowed)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContextSettings {
    pub doctor_id: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            doctor_id: DEFAULT_DOCTOR_ID.to_string(),
        }
    }
}

impl From<&SessionConfig> for ContextSettings {
    fn from(value: &SessionConfig) -> Self {
        Self {
            doctor_id: value.doctor_id.clone(),
        }
    }
}

/// Derives the permission-check context from navigation state.
#[must_use]
pub fn build_context(
    pathname: &str,
    role: Role,
    explicit_patient_id: Option<&str>,
    explicit_appointment_id: Option<&str>,
    settings: &ContextSettings,
) -> ActivityContext {
    let path = strip_query(pathname);

    let current_page = path
        .split('/')
        .find(|segment| !segment.is_empty())
        .and_then(|section| {
            Page::ROUTED
                .into_iter()
                .find(|page| page.as_str() == section)
        })
        .unwrap_or(Page::Dashboard);

    let patient_id = non_empty(explicit_patient_id).or_else(|| segment_after(path, "patients"));
    let appointment_id =
        non_empty(explicit_appointment_id).or_else(|| segment_after(path, "appointments"));

    let doctor_id = (role == Role::Doctor).then(|| settings.doctor_id.clone());

    ActivityContext {
        current_page,
        patient_id,
        appointment_id,
        user_role: role,
        doctor_id,
    }
}

fn strip_query(pathname: &str) -> &str {
    pathname.split(['?', '#']).next().unwrap_or_default()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn segment_after(path: &str, marker: &str) -> Option<String> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    segments.find(|segment| *segment == marker)?;
    segments.next().map(str::to_string)
}

/// Localized text lookup with an explicit default.
pub trait ReasonCatalog {
    fn lookup(&self, key: &str, default: &str) -> String;
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct StaticReasonCatalog {
    entries: BTreeMap<String, String>,
}

impl StaticReasonCatalog {
    #[must_use]
    pub fn builtin() -> Self {
        let entries = [
            (
                Permission::ManagePersonnel,
                Role::Doctor,
                "Personnel management is restricted to administrators.",
            ),
            (
                Permission::ConfigureWorkflows,
                Role::Doctor,
                "Only administrators can configure automation workflows.",
            ),
            (
                Permission::ConfigureSystem,
                Role::Doctor,
                "System configuration is restricted to administrators.",
            ),
            (
                Permission::CreatePatients,
                Role::Doctor,
                "New patients are registered by the front desk or an administrator.",
            ),
            (
                Permission::DeletePatients,
                Role::Doctor,
                "Only administrators can remove patient files.",
            ),
            (
                Permission::AccessRecords,
                Role::Admin,
                "Medical records are only accessible to clinical staff.",
            ),
            (
                Permission::EditRecords,
                Role::Admin,
                "Medical records can only be edited by doctors.",
            ),
            (
                Permission::UseAiTranscription,
                Role::Admin,
                "AI transcription is available to clinical staff only.",
            ),
            (
                Permission::CreateReferrals,
                Role::Admin,
                "Referrals can only be issued by a doctor.",
            ),
        ]
        .into_iter()
        .map(|(permission, role, reason)| {
            (
                denial_reason_key(permission.as_str(), role),
                reason.to_string(),
            )
        })
        .collect();

        Self { entries }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        self.entries.extend(
            overrides
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReasonCatalog for StaticReasonCatalog {
    fn lookup(&self, key: &str, default: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub permission: &'a str,
    pub context: Option<&'a ActivityContext>,
    pub action_type: Option<&'a str>,
}

impl<'a> GateRequest<'a> {
    #[must_use]
    pub fn new(permission: &'a str) -> Self {
        Self {
            permission,
            context: None,
            action_type: None,
        }
    }

    #[must_use]
    pub fn in_context(mut self, context: &'a ActivityContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn action_type(mut self, action_type: &'a str) -> Self {
        self.action_type = Some(action_type);
        self
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct Denial {
    pub permission: String,
    pub role: Role,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct Decision {
    pub permission: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    pub role: Role,
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<Denial>,
}

/// Result of gating some protected content.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Rendered<T> {
    Granted { content: T },
    Fallback {
        content: T,
        denial: Denial,
    },
    /// Original content shown non-interactive.
    Disabled {
        content: T,
        denial: Denial,
    },
}

impl<T> Rendered<T> {
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    #[must_use]
    pub fn content(&self) -> &T {
        match self {
            Self::Granted { content }
            | Self::Fallback { content, .. }
            | Self::Disabled { content, .. } => content,
        }
    }

    #[must_use]
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Granted { .. } => None,
            Self::Fallback { denial, .. } | Self::Disabled { denial, .. } => Some(denial),
        }
    }
}

pub struct PermissionGate {
    roles: Arc<RoleStore>,
    catalog: Box<dyn ReasonCatalog + Send + Sync>,
    default_reason: String,
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("role", &self.roles.role())
            .field("default_reason", &self.default_reason)
            .finish_non_exhaustive()
    }
}

impl PermissionGate {
    #[must_use]
    pub fn new(roles: Arc<RoleStore>, catalog: Box<dyn ReasonCatalog + Send + Sync>) -> Self {
        Self {
            roles,
            catalog,
            default_reason: DEFAULT_DENIAL_REASON.to_string(),
        }
    }

    /// Gate with the built-in catalog plus any configured overrides.
    #[must_use]
    pub fn from_config(roles: Arc<RoleStore>, config: &SessionConfig) -> Self {
        let catalog = StaticReasonCatalog::builtin().with_overrides(&config.denial_reasons);
        Self::new(roles, Box::new(catalog)).with_default_reason(&config.default_denial_reason)
    }

    #[must_use]
    pub fn with_default_reason(mut self, reason: &str) -> Self {
        reason.clone_into(&mut self.default_reason);
        self
    }

    #[must_use]
    pub fn check(&self, request: GateRequest<'_>) -> Decision {
        let role = request
            .context
            .map_or_else(|| self.roles.role(), |context| context.user_role);
        let granted = PermissionSet::for_role(role)
            .can_perform_action(request.permission, request.action_type);

        let denial = if granted {
            None
        } else {
            let key = denial_reason_key(request.permission, role);
            let reason = self.catalog.lookup(&key, &self.default_reason);
            tracing::debug!(
                permission = request.permission,
                action_type = request.action_type,
                role = %role,
                "permission denied"
            );
            Some(Denial {
                permission: request.permission.to_string(),
                role,
                reason,
            })
        };

        Decision {
            permission: request.permission.to_string(),
            action_type: request.action_type.map(str::to_string),
            role,
            granted,
            denial,
        }
    }

    #[must_use]
    pub fn render<T>(
        &self,
        request: GateRequest<'_>,
        children: T,
        fallback: Option<T>,
    ) -> Rendered<T> {
        match self.check(request).denial {
            None => Rendered::Granted { content: children },
            Some(denial) => match fallback {
                Some(content) => Rendered::Fallback { content, denial },
                None => Rendered::Disabled {
                    content: children,
                    denial,
                },
            },
        }
    }
}
