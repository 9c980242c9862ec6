//! Command surface for the clinic access core.
//!
//! Hosts embed the same behavior the `clinic` binary exposes through:
//! - [`run_cli`] for parsed CLI execution that prints JSON to stdout.
//! - [`execute`] for parsed CLI execution that returns the JSON value.
//! - [`Session`] for driving all stores in-process from scripted operations.

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use clinic_access_activity::{ActivityFilter, ActivityLogStore, MemoryNotifier, Notification};
use clinic_access_domain::{
    ActivityId, ActivityStatus, NewActivity, Role, SessionConfig, Workflow,
};
use clinic_access_policy::{
    build_context, ContextSettings, GateRequest, PermissionGate, PermissionSet, RoleStore,
};
use clinic_access_workflow::{
    definition_hash, load_workflow_from_path, validate_workflow, WorkflowStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic role, activity and workflow access CLI")]
pub struct Cli {
    /// Session configuration file (JSON or YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured initial role.
    #[arg(long, global = true, env = "CLINIC_ROLE")]
    role: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Permissions {
        #[command(subcommand)]
        command: PermissionsCommand,
    },
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
    Gate {
        #[command(subcommand)]
        command: GateCommand,
    },
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum PermissionsCommand {
    Show(PermissionsShowArgs),
    Check(PermissionsCheckArgs),
}

#[derive(Debug, Args)]
pub struct PermissionsShowArgs {
    /// Free-form role name; unknown names resolve to no permissions.
    #[arg(long)]
    role_name: Option<String>,
}

#[derive(Debug, Args)]
pub struct PermissionsCheckArgs {
    #[arg(long)]
    permission: String,
    #[arg(long)]
    action_type: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ContextCommand {
    Build(ContextBuildArgs),
}

#[derive(Debug, Args)]
pub struct ContextBuildArgs {
    #[arg(long)]
    path: String,
    #[arg(long)]
    patient_id: Option<String>,
    #[arg(long)]
    appointment_id: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum GateCommand {
    Check(GateCheckArgs),
}

#[derive(Debug, Args)]
pub struct GateCheckArgs {
    #[arg(long)]
    permission: String,
    #[arg(long)]
    action_type: Option<String>,
    /// Evaluate inside the context derived from this path.
    #[arg(long)]
    path: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    Templates,
    Validate(WorkflowFileArgs),
    Test(WorkflowFileArgs),
    Instantiate(WorkflowInstantiateArgs),
}

#[derive(Debug, Args)]
pub struct WorkflowFileArgs {
    #[arg(long)]
    file: PathBuf,
}

#[derive(Debug, Args)]
pub struct WorkflowInstantiateArgs {
    #[arg(long)]
    template: String,
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    Run(SessionRunArgs),
}

#[derive(Debug, Args)]
pub struct SessionRunArgs {
    #[arg(long)]
    script: PathBuf,
}

/// Execute a parsed command and print its JSON result.
///
/// # Errors
/// Returns an error when configuration or input files are invalid, or when a
/// command fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let output = execute(cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Execute a parsed command and return its JSON result.
///
/// # Errors
/// Returns an error when configuration or input files are invalid, or when a
/// command fails.
pub fn execute(cli: Cli) -> Result<Value> {
    let config = resolve_config(cli.config.as_deref(), cli.role.as_deref())?;
    let role = config.initial_role;

    match cli.command {
        Command::Permissions { command } => match command {
            PermissionsCommand::Show(args) => {
                let (role_name, set) = match args.role_name {
                    Some(name) => {
                        let set = PermissionSet::for_role_name(&name);
                        (name, set)
                    }
                    None => (role.as_str().to_string(), PermissionSet::for_role(role)),
                };
                Ok(json!({ "role": role_name, "permissions": set }))
            }
            PermissionsCommand::Check(args) => {
                let allowed = PermissionSet::for_role(role)
                    .can_perform_action(&args.permission, args.action_type.as_deref());
                Ok(json!({
                    "role": role,
                    "permission": args.permission,
                    "action_type": args.action_type,
                    "allowed": allowed,
                }))
            }
        },
        Command::Context { command } => match command {
            ContextCommand::Build(args) => {
                let context = build_context(
                    &args.path,
                    role,
                    args.patient_id.as_deref(),
                    args.appointment_id.as_deref(),
                    &ContextSettings::from(&config),
                );
                Ok(serde_json::to_value(context)?)
            }
        },
        Command::Gate { command } => match command {
            GateCommand::Check(args) => {
                let mut session = Session::new(config);
                session.apply(SessionOp::Gate {
                    permission: args.permission,
                    action_type: args.action_type,
                    path: args.path,
                })
            }
        },
        Command::Workflow { command } => run_workflow(command, &config),
        Command::Session { command } => match command {
            SessionCommand::Run(args) => {
                let ops = load_script(&args.script)?;
                let mut session = Session::new(config);
                let transcript = session.run(ops)?;
                Ok(serde_json::to_value(transcript)?)
            }
        },
    }
}

fn run_workflow(command: WorkflowCommand, config: &SessionConfig) -> Result<Value> {
    let store = WorkflowStore::new(&config.system_author);
    match command {
        WorkflowCommand::Templates => Ok(serde_json::to_value(store.list_templates())?),
        WorkflowCommand::Validate(args) => {
            let workflow = load_workflow_from_path(&args.file)?;
            Ok(json!({
                "workflow_id": workflow.id,
                "definition_hash": definition_hash(&workflow)?,
                "report": validate_workflow(&workflow),
            }))
        }
        WorkflowCommand::Test(args) => {
            let workflow = load_workflow_from_path(&args.file)?;
            Ok(serde_json::to_value(store.test(&workflow))?)
        }
        WorkflowCommand::Instantiate(args) => {
            let workflow = store.create_from_template(&args.template, args.name.as_deref())?;
            Ok(serde_json::to_value(workflow)?)
        }
    }
}

/// Loads the session configuration and applies the role override.
///
/// # Errors
/// Returns an error when the file cannot be read or decoded, the resulting
/// configuration is invalid, or the role override names an unknown role.
pub fn resolve_config(path: Option<&Path>, role: Option<&str>) -> Result<SessionConfig> {
    let mut config = match path {
        Some(path) => {
            let value = read_document(path)
                .with_context(|| format!("failed loading session config {}", path.display()))?;
            SessionConfig::from_json(&value)?
        }
        None => SessionConfig::default(),
    };

    if let Some(role) = role {
        config.initial_role = parse_role(role)?;
    }

    Ok(config)
}

/// Session roles only; other role names resolve through `permissions show`.
fn parse_role(value: &str) -> Result<Role> {
    match Role::parse(value) {
        Some(role) if role.is_session_role() => Ok(role),
        Some(role) => bail!("role {role} cannot be selected for a session"),
        None => bail!("unknown role: {value}"),
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&content).map_err(|err| anyhow!("invalid YAML document: {err}"))
        }
        _ => serde_json::from_str(&content).map_err(|err| anyhow!("invalid JSON document: {err}")),
    }
}

/// Reads a session script: a JSON or YAML list of operations.
///
/// # Errors
/// Returns an error when the file cannot be read or an operation is malformed.
pub fn load_script(path: &Path) -> Result<Vec<SessionOp>> {
    let value = read_document(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("invalid session script {}", path.display()))
}

/// Refers to an activity recorded earlier in the same session.
///
/// `last` is the most recent one, `#N` the Nth (1-based), anything else is
/// parsed as an activity id.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct ActivityRef(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SessionOp {
    SetRole {
        role: String,
    },
    Check {
        permission: String,
        #[serde(default)]
        action_type: Option<String>,
    },
    BuildContext {
        path: String,
        #[serde(default)]
        patient_id: Option<String>,
        #[serde(default)]
        appointment_id: Option<String>,
    },
    Gate {
        permission: String,
        #[serde(default)]
        action_type: Option<String>,
        #[serde(default)]
        path: Option<String>,
    },
    AddActivity {
        activity: NewActivity,
    },
    UpdateStatus {
        activity: ActivityRef,
        status: ActivityStatus,
    },
    ListActivities {
        #[serde(default)]
        filter: ActivityFilter,
    },
    SaveWorkflow {
        workflow: Workflow,
    },
    GetWorkflow {
        id: String,
    },
    DeleteWorkflow {
        id: String,
    },
    ListWorkflows,
    ValidateWorkflow {
        workflow: Workflow,
    },
    TestWorkflow {
        workflow: Workflow,
    },
    CreateFromTemplate {
        template_id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl SessionOp {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetRole { .. } => "set_role",
            Self::Check { .. } => "check",
            Self::BuildContext { .. } => "build_context",
            Self::Gate { .. } => "gate",
            Self::AddActivity { .. } => "add_activity",
            Self::UpdateStatus { .. } => "update_status",
            Self::ListActivities { .. } => "list_activities",
            Self::SaveWorkflow { .. } => "save_workflow",
            Self::GetWorkflow { .. } => "get_workflow",
            Self::DeleteWorkflow { .. } => "delete_workflow",
            Self::ListWorkflows => "list_workflows",
            Self::ValidateWorkflow { .. } => "validate_workflow",
            Self::TestWorkflow { .. } => "test_workflow",
            Self::CreateFromTemplate { .. } => "create_from_template",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptStep {
    pub step: usize,
    pub op: &'static str,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub final_role: Role,
    pub steps: Vec<TranscriptStep>,
    pub notifications: Vec<Notification>,
}

/// One in-process clinic session: role store, gate, activity log and
/// workflow store sharing a single configuration.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    roles: Arc<RoleStore>,
    gate: PermissionGate,
    activities: ActivityLogStore,
    notifier: Arc<MemoryNotifier>,
    workflows: WorkflowStore,
    recorded: Vec<ActivityId>,
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let roles = Arc::new(RoleStore::new(config.initial_role));
        let gate = PermissionGate::from_config(Arc::clone(&roles), &config);
        let notifier = Arc::new(MemoryNotifier::new());
        let activities = ActivityLogStore::new(notifier.clone());
        let workflows = WorkflowStore::new(&config.system_author);

        Self {
            config,
            roles,
            gate,
            activities,
            notifier,
            workflows,
            recorded: Vec::new(),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.roles.role()
    }

    /// Applies every operation in order and collects the transcript.
    ///
    /// # Errors
    /// Returns an error naming the failing step when an operation carries
    /// invalid input.
    pub fn run(&mut self, ops: Vec<SessionOp>) -> Result<Transcript> {
        let mut steps = Vec::with_capacity(ops.len());
        for (index, op) in ops.into_iter().enumerate() {
            let step = index + 1;
            let name = op.as_str();
            let result = self
                .apply(op)
                .with_context(|| format!("session step {step} ({name}) failed"))?;
            tracing::debug!(step, op = name, "session step applied");
            steps.push(TranscriptStep {
                step,
                op: name,
                result,
            });
        }

        Ok(Transcript {
            final_role: self.role(),
            steps,
            notifications: self.notifier.drain(),
        })
    }

    /// Applies one operation and returns its JSON result.
    ///
    /// Lookups that miss (unknown template, unknown workflow) are reported in
    /// the result, not as errors.
    ///
    /// # Errors
    /// Returns an error when the operation names an unknown role or an
    /// activity reference that cannot be resolved.
    pub fn apply(&mut self, op: SessionOp) -> Result<Value> {
        let value = match op {
            SessionOp::SetRole { role } => {
                let role = parse_role(&role)?;
                self.roles.set_role(role);
                json!({ "role": role })
            }
            SessionOp::Check {
                permission,
                action_type,
            } => {
                let role = self.role();
                let allowed = PermissionSet::for_role(role)
                    .can_perform_action(&permission, action_type.as_deref());
                json!({
                    "role": role,
                    "permission": permission,
                    "action_type": action_type,
                    "allowed": allowed,
                })
            }
            SessionOp::BuildContext {
                path,
                patient_id,
                appointment_id,
            } => serde_json::to_value(build_context(
                &path,
                self.role(),
                patient_id.as_deref(),
                appointment_id.as_deref(),
                &ContextSettings::from(&self.config),
            ))?,
            SessionOp::Gate {
                permission,
                action_type,
                path,
            } => {
                let context = path.map(|path| {
                    build_context(
                        &path,
                        self.role(),
                        None,
                        None,
                        &ContextSettings::from(&self.config),
                    )
                });
                let mut request = GateRequest::new(&permission);
                if let Some(context) = context.as_ref() {
                    request = request.in_context(context);
                }
                if let Some(action_type) = action_type.as_deref() {
                    request = request.action_type(action_type);
                }
                serde_json::to_value(self.gate.check(request))?
            }
            SessionOp::AddActivity { activity } => {
                let activity = self.activities.add(activity);
                self.recorded.push(activity.id);
                serde_json::to_value(activity)?
            }
            SessionOp::UpdateStatus { activity, status } => {
                let id = self.resolve_activity(&activity)?;
                let outcome = self.activities.update_status(id, status);
                json!({
                    "id": id,
                    "outcome": outcome,
                    "activity": self.activities.get(id),
                })
            }
            SessionOp::ListActivities { filter } => {
                serde_json::to_value(self.activities.filter(&filter))?
            }
            SessionOp::SaveWorkflow { workflow } => {
                serde_json::to_value(self.workflows.save(workflow))?
            }
            SessionOp::GetWorkflow { id } => match self.workflows.get(&id) {
                Some(workflow) => serde_json::to_value(workflow)?,
                None => json!({ "found": false, "id": id }),
            },
            SessionOp::DeleteWorkflow { id } => {
                json!({ "id": id, "deleted": self.workflows.delete(&id) })
            }
            SessionOp::ListWorkflows => serde_json::to_value(self.workflows.list())?,
            SessionOp::ValidateWorkflow { workflow } => {
                serde_json::to_value(self.workflows.validate(&workflow))?
            }
            SessionOp::TestWorkflow { workflow } => {
                serde_json::to_value(self.workflows.test(&workflow))?
            }
            SessionOp::CreateFromTemplate { template_id, name } => {
                match self
                    .workflows
                    .create_from_template(&template_id, name.as_deref())
                {
                    Ok(workflow) => serde_json::to_value(workflow)?,
                    Err(err) => json!({ "error": err.to_string() }),
                }
            }
        };
        Ok(value)
    }

    fn resolve_activity(&self, reference: &ActivityRef) -> Result<ActivityId> {
        let raw = reference.0.trim();
        if raw == "last" {
            return self
                .recorded
                .last()
                .copied()
                .ok_or_else(|| anyhow!("no activity recorded yet"));
        }

        if let Some(position) = raw.strip_prefix('#') {
            let position: usize = position
                .parse()
                .with_context(|| format!("invalid activity position {raw}"))?;
            return position
                .checked_sub(1)
                .and_then(|index| self.recorded.get(index))
                .copied()
                .ok_or_else(|| anyhow!("no activity recorded at position {position}"));
        }

        match ActivityId::parse(raw) {
            Some(id) => Ok(id),
            None => bail!("invalid activity reference: {raw}"),
        }
    }
}
