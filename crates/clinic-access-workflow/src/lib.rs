#![forbid(unsafe_code)]

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clinic_access_domain::{
    hash_json, now_utc, unix_millis, AccessError, StepType, TemplateCategory, Workflow,
    WorkflowBlueprint, WorkflowStep, WorkflowTemplate, DEFAULT_SYSTEM_AUTHOR,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const SIMULATION_STATUS: &str = "simulated";

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SimulationSummary {
    pub steps_executed: usize,
    pub elapsed_ms: u64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TestReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<SimulationSummary>,
}

/// Checks every structural invariant and reports all violations at once.
#[must_use]
pub fn validate_workflow(workflow: &Workflow) -> ValidationReport {
    let mut errors = Vec::new();

    if workflow.name.trim().is_empty() {
        errors.push("workflow name is required".to_string());
    }

    if workflow.steps.is_empty() {
        errors.push("workflow must contain at least one step".to_string());
    }

    if !workflow.has_trigger_step() {
        errors.push("workflow must contain at least one trigger step".to_string());
    }

    let step_ids: HashSet<&str> = workflow.steps.iter().map(|step| step.id.as_str()).collect();
    for step in &workflow.steps {
        for target in &step.connections {
            if !step_ids.contains(target.as_str()) {
                errors.push(format!(
                    "step '{}' ({}) connects to unknown step '{}'",
                    step.name, step.id, target
                ));
            }
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Dry run: structural checks only, never executes step actions.
#[must_use]
pub fn simulate_workflow(workflow: &Workflow) -> TestReport {
    if workflow.steps.is_empty() {
        return TestReport {
            success: false,
            message: "workflow must contain at least one step".to_string(),
            results: None,
        };
    }

    if !workflow.has_trigger_step() {
        return TestReport {
            success: false,
            message: "workflow must contain at least one trigger step".to_string(),
            results: None,
        };
    }

    let started = Instant::now();
    let steps_executed = workflow
        .steps
        .iter()
        .inspect(|step| {
            tracing::debug!(
                workflow_id = %workflow.id,
                step_id = %step.id,
                step_type = step.step_type.as_str(),
                "simulated step"
            );
        })
        .count();
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    TestReport {
        success: true,
        message: format!("workflow test completed: {steps_executed} steps simulated"),
        results: Some(SimulationSummary {
            steps_executed,
            elapsed_ms,
            status: SIMULATION_STATUS.to_string(),
        }),
    }
}

/// SHA-256 over the canonical JSON of the workflow's structural fields.
///
/// # Errors
/// Returns an error if the workflow cannot be serialized.
pub fn definition_hash(workflow: &Workflow) -> Result<String> {
    let canonical = json!({
        "name": workflow.name,
        "description": workflow.description,
        "is_active": workflow.is_active,
        "steps": serde_json::to_value(&workflow.steps)?,
        "triggers": workflow.triggers,
        "approval_required": workflow.approval_required,
    });
    Ok(hash_json(&canonical))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Load a workflow definition from a JSON or YAML file.
///
/// # Errors
/// Returns an error when the file cannot be read or decoded.
pub fn load_workflow_from_path(path: &Path) -> Result<Workflow> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed reading workflow file {}", path.display()))?;
    parse_workflow_document(&content, DocumentFormat::from_path(path))
}

/// Decode a workflow definition without validating it.
///
/// # Errors
/// Returns an error when the document does not match the workflow structure.
pub fn parse_workflow_document(content: &str, format: DocumentFormat) -> Result<Workflow> {
    match format {
        DocumentFormat::Json => serde_json::from_str(content)
            .map_err(|err| anyhow!("invalid workflow JSON structure: {err}")),
        DocumentFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|err| anyhow!("invalid workflow YAML structure: {err}")),
    }
}

fn triggers(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Seed templates offered by the workflow editor.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate {
            id: "template_patient_reminder".to_string(),
            name: "Appointment reminder".to_string(),
            description: "Reminds patients of upcoming appointments by SMS and follows up by call"
                .to_string(),
            category: TemplateCategory::Communication,
            workflow: WorkflowBlueprint {
                name: "Appointment reminder".to_string(),
                description: "Send a reminder 24h before each appointment".to_string(),
                is_active: true,
                steps: vec![
                    WorkflowStep::new(
                        "trigger_1",
                        StepType::Trigger,
                        "Appointment scheduled",
                        "Fires when an appointment is booked",
                    )
                    .at(100.0, 100.0)
                    .config("event", "appointment_scheduled")
                    .connect("condition_1"),
                    WorkflowStep::new(
                        "condition_1",
                        StepType::Condition,
                        "24h before appointment",
                        "Waits until one day before the visit",
                    )
                    .at(300.0, 100.0)
                    .config("hours_before", 24.0)
                    .connect("action_1"),
                    WorkflowStep::new(
                        "action_1",
                        StepType::Action,
                        "Send SMS reminder",
                        "Texts the patient the appointment details",
                    )
                    .at(500.0, 100.0)
                    .config("channel", "sms")
                    .config("template", "appointment_reminder")
                    .connect("action_2"),
                    WorkflowStep::new(
                        "action_2",
                        StepType::Action,
                        "AI confirmation call",
                        "Calls patients who did not confirm by SMS",
                    )
                    .at(700.0, 100.0)
                    .config("channel", "voice")
                    .config("only_if_unconfirmed", true),
                ],
                triggers: triggers(&["appointment_scheduled"]),
                approval_required: false,
            },
        },
        WorkflowTemplate {
            id: "template_post_visit_follow_up".to_string(),
            name: "Post-visit follow-up".to_string(),
            description: "Checks in with patients after a consultation".to_string(),
            category: TemplateCategory::Clinical,
            workflow: WorkflowBlueprint {
                name: "Post-visit follow-up".to_string(),
                description: "Follow up three days after a consultation".to_string(),
                is_active: true,
                steps: vec![
                    WorkflowStep::new(
                        "trigger_1",
                        StepType::Trigger,
                        "Consultation completed",
                        "Fires when a doctor closes a consultation",
                    )
                    .at(100.0, 100.0)
                    .config("event", "consultation_completed")
                    .connect("action_1"),
                    WorkflowStep::new(
                        "action_1",
                        StepType::Action,
                        "Generate visit summary",
                        "Drafts a summary of the consultation",
                    )
                    .at(300.0, 100.0)
                    .config("model", "summary")
                    .connect("approval_1"),
                    WorkflowStep::new(
                        "approval_1",
                        StepType::Approval,
                        "Doctor review",
                        "The treating doctor approves the summary",
                    )
                    .at(500.0, 100.0)
                    .config("approver_role", "doctor")
                    .connect("action_2"),
                    WorkflowStep::new(
                        "action_2",
                        StepType::Action,
                        "Follow-up message",
                        "Sends the summary and a check-in message",
                    )
                    .at(700.0, 100.0)
                    .config("delay_hours", 72.0)
                    .config("channel", "email"),
                ],
                triggers: triggers(&["consultation_completed"]),
                approval_required: true,
            },
        },
        WorkflowTemplate {
            id: "template_lab_results_review".to_string(),
            name: "Lab results review".to_string(),
            description: "Routes incoming lab results to the responsible doctor".to_string(),
            category: TemplateCategory::Clinical,
            workflow: WorkflowBlueprint {
                name: "Lab results review".to_string(),
                description: "Flag abnormal results for urgent review".to_string(),
                is_active: false,
                steps: vec![
                    WorkflowStep::new(
                        "trigger_1",
                        StepType::Trigger,
                        "Lab results received",
                        "Fires when a laboratory uploads results",
                    )
                    .at(100.0, 100.0)
                    .config("event", "lab_results_received")
                    .connect("condition_1"),
                    WorkflowStep::new(
                        "condition_1",
                        StepType::Condition,
                        "Abnormal values",
                        "Checks whether any value is outside the reference range",
                    )
                    .at(300.0, 100.0)
                    .config("field", "abnormal")
                    .config("equals", true)
                    .connect("action_1")
                    .connect("action_2"),
                    WorkflowStep::new(
                        "action_1",
                        StepType::Action,
                        "Urgent doctor alert",
                        "Notifies the responsible doctor immediately",
                    )
                    .at(500.0, 50.0)
                    .config("priority", "high"),
                    WorkflowStep::new(
                        "action_2",
                        StepType::Action,
                        "File results",
                        "Attaches the results to the patient record",
                    )
                    .at(500.0, 150.0)
                    .config("target", "medical_record"),
                ],
                triggers: triggers(&["lab_results_received"]),
                approval_required: false,
            },
        },
        WorkflowTemplate {
            id: "template_new_patient_intake".to_string(),
            name: "New patient intake".to_string(),
            description: "Collects intake information before a first visit".to_string(),
            category: TemplateCategory::Administrative,
            workflow: WorkflowBlueprint {
                name: "New patient intake".to_string(),
                description: "Send intake forms to newly registered patients".to_string(),
                is_active: true,
                steps: vec![
                    WorkflowStep::new(
                        "trigger_1",
                        StepType::Trigger,
                        "Patient registered",
                        "Fires when a new patient file is created",
                    )
                    .at(100.0, 100.0)
                    .config("event", "patient_created")
                    .connect("action_1"),
                    WorkflowStep::new(
                        "action_1",
                        StepType::Action,
                        "Send intake form",
                        "Emails the digital intake questionnaire",
                    )
                    .at(300.0, 100.0)
                    .config("form", "intake_v2")
                    .config("channel", "email")
                    .connect("condition_1"),
                    WorkflowStep::new(
                        "condition_1",
                        StepType::Condition,
                        "Form not returned",
                        "Checks whether the form is still missing after 48h",
                    )
                    .at(500.0, 100.0)
                    .config("hours", 48.0)
                    .connect("action_2"),
                    WorkflowStep::new(
                        "action_2",
                        StepType::Action,
                        "Reminder call",
                        "Calls the patient to complete intake by phone",
                    )
                    .at(700.0, 100.0)
                    .config("channel", "voice"),
                ],
                triggers: triggers(&["patient_created"]),
                approval_required: false,
            },
        },
        WorkflowTemplate {
            id: "template_referral_processing".to_string(),
            name: "Referral processing".to_string(),
            description: "Prepares referral letters and books the specialist".to_string(),
            category: TemplateCategory::Administrative,
            workflow: WorkflowBlueprint {
                name: "Referral processing".to_string(),
                description: "Draft, approve and send specialist referrals".to_string(),
                is_active: false,
                steps: vec![
                    WorkflowStep::new(
                        "trigger_1",
                        StepType::Trigger,
                        "Referral requested",
                        "Fires when a doctor requests a referral",
                    )
                    .at(100.0, 100.0)
                    .config("event", "referral_requested")
                    .connect("action_1"),
                    WorkflowStep::new(
                        "action_1",
                        StepType::Action,
                        "Draft referral letter",
                        "Generates the letter from the consultation notes",
                    )
                    .at(300.0, 100.0)
                    .config("model", "referral_letter")
                    .connect("approval_1"),
                    WorkflowStep::new(
                        "approval_1",
                        StepType::Approval,
                        "Doctor signature",
                        "The referring doctor signs the letter",
                    )
                    .at(500.0, 100.0)
                    .config("approver_role", "doctor")
                    .connect("action_2"),
                    WorkflowStep::new(
                        "action_2",
                        StepType::Action,
                        "Send to specialist",
                        "Transmits the letter and requests an appointment",
                    )
                    .at(700.0, 100.0)
                    .config("channel", "secure_message"),
                ],
                triggers: triggers(&["referral_requested"]),
                approval_required: true,
            },
        },
    ]
}

/// In-memory workflow definitions plus the immutable template catalog.
#[derive(Debug)]
pub struct WorkflowStore {
    workflows: Mutex<Vec<Workflow>>,
    templates: Vec<WorkflowTemplate>,
    system_author: String,
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_AUTHOR)
    }
}

impl WorkflowStore {
    #[must_use]
    pub fn new(system_author: &str) -> Self {
        Self::with_templates(system_author, builtin_templates())
    }

    #[must_use]
    pub fn with_templates(system_author: &str, templates: Vec<WorkflowTemplate>) -> Self {
        Self {
            workflows: Mutex::new(Vec::new()),
            templates,
            system_author: system_author.to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Workflow>> {
        self.workflows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn list(&self) -> Vec<Workflow> {
        self.lock().clone()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Workflow> {
        self.lock().iter().find(|workflow| workflow.id == id).cloned()
    }

    /// Upserts by id. A blank id is replaced with a fresh one.
    pub fn save(&self, mut workflow: Workflow) -> Workflow {
        let mut workflows = self.lock();
        let now = now_utc();

        if workflow.id.trim().is_empty() {
            workflow.id = fresh_workflow_id(&workflows);
        }

        if let Some(existing) = workflows.iter_mut().find(|item| item.id == workflow.id) {
            workflow.created_at = existing.created_at;
            workflow.updated_at = now;
            *existing = workflow.clone();
            tracing::info!(workflow_id = %workflow.id, "workflow updated");
        } else {
            workflow.created_at = now;
            workflow.updated_at = now;
            workflows.push(workflow.clone());
            tracing::info!(workflow_id = %workflow.id, "workflow created");
        }

        workflow
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut workflows = self.lock();
        let before = workflows.len();
        workflows.retain(|workflow| workflow.id != id);
        let removed = workflows.len() != before;
        if removed {
            tracing::info!(workflow_id = id, "workflow deleted");
        }
        removed
    }

    #[must_use]
    pub fn validate(&self, workflow: &Workflow) -> ValidationReport {
        validate_workflow(workflow)
    }

    #[must_use]
    pub fn test(&self, workflow: &Workflow) -> TestReport {
        simulate_workflow(workflow)
    }

    #[must_use]
    pub fn list_templates(&self) -> Vec<WorkflowTemplate> {
        self.templates.clone()
    }

    /// Stamps a new workflow from a template and saves it.
    ///
    /// # Errors
    /// Returns [`AccessError::NotFound`] for an unknown template id; the store
    /// is left unchanged.
    pub fn create_from_template(
        &self,
        template_id: &str,
        custom_name: Option<&str>,
    ) -> Result<Workflow, AccessError> {
        let Some(template) = self
            .templates
            .iter()
            .find(|template| template.id == template_id)
        else {
            tracing::warn!(template_id, "unknown workflow template");
            return Err(AccessError::not_found("workflow template", template_id));
        };

        let name = custom_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&template.workflow.name)
            .to_string();

        let now = now_utc();
        let blueprint = template.workflow.clone();
        let workflow = Workflow {
            id: String::new(),
            name,
            description: blueprint.description,
            is_active: blueprint.is_active,
            steps: blueprint.steps,
            triggers: blueprint.triggers,
            approval_required: blueprint.approval_required,
            created_by: self.system_author.clone(),
            created_at: now,
            updated_at: now,
        };

        Ok(self.save(workflow))
    }
}

fn fresh_workflow_id(existing: &[Workflow]) -> String {
    let base = format!("workflow_{}", unix_millis(now_utc()));
    if existing.iter().all(|workflow| workflow.id != base) {
        return base;
    }

    (1_u32..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| existing.iter().all(|workflow| &workflow.id != candidate))
        .unwrap_or(base)
}
