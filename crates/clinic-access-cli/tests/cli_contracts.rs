#![allow(clippy::uninlined_format_args)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::{json, Value};
use ulid::Ulid;

fn clinic_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_clinic"))
}

fn temp_path(name: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("clinic-cli-test-{}-{}.{}", name, Ulid::new(), ext))
}

fn write_fixture(name: &str, ext: &str, content: &str) -> PathBuf {
    let path = temp_path(name, ext);
    if let Err(err) = fs::write(&path, content) {
        panic!("failed to write fixture {}: {err}", path.display());
    }
    path
}

fn clinic_output(args: &[&str]) -> Output {
    match Command::new(clinic_binary_path())
        .env_remove("CLINIC_ROLE")
        .args(args)
        .output()
    {
        Ok(output) => output,
        Err(err) => panic!("failed to run clinic command {:?}: {err}", args),
    }
}

fn stdout_json(output: &Output) -> Value {
    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value) => value,
        Err(err) => panic!(
            "failed to parse stdout as JSON: {err}\nstdout={}\nstderr={}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    }
}

#[test]
fn help_lists_expected_subcommands() {
    let output = clinic_output(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for required in ["permissions", "context", "gate", "workflow", "session"] {
        assert!(stdout.contains(required), "missing subcommand {required}");
    }
}

#[test]
fn permissions_show_defaults_to_admin() {
    let output = clinic_output(&["permissions", "show"]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["role"], json!("admin"));
    assert_eq!(value["permissions"]["canManagePersonnel"], json!(true));
    assert_eq!(value["permissions"]["canAccessRecords"], json!(false));
}

#[test]
fn role_env_var_selects_doctor() {
    let output = match Command::new(clinic_binary_path())
        .env("CLINIC_ROLE", "doctor")
        .args(["permissions", "check", "--permission", "canAccessRecords"])
        .output()
    {
        Ok(output) => output,
        Err(err) => panic!("failed to run clinic: {err}"),
    };
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["role"], json!("doctor"));
    assert_eq!(value["allowed"], json!(true));
}

#[test]
fn config_file_overrides_denial_reason() {
    let config = write_fixture(
        "config",
        "yaml",
        "initial_role: doctor\ndenial_reasons:\n  permissions.denied.canConfigureSystem.doctor: Ask the clinic owner.\n",
    );
    let config_arg = config.display().to_string();

    let output = clinic_output(&[
        "--config",
        &config_arg,
        "gate",
        "check",
        "--permission",
        "canConfigureSystem",
        "--path",
        "/configuration",
    ]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["granted"], json!(false));
    assert_eq!(value["role"], json!("doctor"));
    assert_eq!(value["denial"]["reason"], json!("Ask the clinic owner."));

    let _ = fs::remove_file(config);
}

#[test]
fn non_session_role_from_env_is_rejected() {
    let output = match Command::new(clinic_binary_path())
        .env("CLINIC_ROLE", "nurse")
        .args(["permissions", "show"])
        .output()
    {
        Ok(output) => output,
        Err(err) => panic!("failed to run clinic: {err}"),
    };
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn invalid_config_fails_with_nonzero_exit() {
    let config = write_fixture("bad-config", "json", r#"{"doctor_id": ""}"#);
    let config_arg = config.display().to_string();

    let output = clinic_output(&["--config", &config_arg, "permissions", "show"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());

    let _ = fs::remove_file(config);
}

#[test]
fn workflow_validate_reports_every_error() {
    let workflow = write_fixture(
        "workflow",
        "json",
        r#"{"name": "", "steps": [{"id": "a1", "type": "action", "name": "Send", "connections": ["ghost"]}]}"#,
    );
    let workflow_arg = workflow.display().to_string();

    let output = clinic_output(&["workflow", "validate", "--file", &workflow_arg]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["report"]["is_valid"], json!(false));
    let errors = match value["report"]["errors"].as_array() {
        Some(errors) => errors.clone(),
        None => panic!("errors must be an array: {value}"),
    };
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .any(|error| error.as_str().is_some_and(|text| text.contains("ghost"))));
    assert_eq!(value["definition_hash"].as_str().map(str::len), Some(64));

    let _ = fs::remove_file(workflow);
}

#[test]
fn workflow_test_simulates_yaml_definition() {
    let workflow = write_fixture(
        "workflow",
        "yaml",
        "name: Reminder\nsteps:\n  - id: t1\n    type: trigger\n    name: Start\n    connections: [a1]\n  - id: a1\n    type: action\n    name: Send\n",
    );
    let workflow_arg = workflow.display().to_string();

    let output = clinic_output(&["workflow", "test", "--file", &workflow_arg]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["results"]["steps_executed"], json!(2));
    assert_eq!(value["results"]["status"], json!("simulated"));

    let _ = fs::remove_file(workflow);
}

#[test]
fn workflow_templates_and_instantiate() {
    let output = clinic_output(&["workflow", "templates"]);
    assert!(output.status.success());
    let templates = stdout_json(&output);
    assert_eq!(templates.as_array().map(Vec::len), Some(5));

    let output = clinic_output(&[
        "workflow",
        "instantiate",
        "--template",
        "template_referral_processing",
        "--name",
        "Cardiology referrals",
    ]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["name"], json!("Cardiology referrals"));
    assert_eq!(value["created_by"], json!("system"));
    assert!(value["id"]
        .as_str()
        .is_some_and(|id| id.starts_with("workflow_")));

    let output = clinic_output(&["workflow", "instantiate", "--template", "nope"]);
    assert!(!output.status.success());
}

#[test]
fn session_script_produces_transcript_and_notifications() {
    let script = write_fixture(
        "session",
        "json",
        r#"[
            {"op": "set_role", "role": "doctor"},
            {"op": "gate", "permission": "canManagePersonnel", "path": "/personnel"},
            {"op": "add_activity", "activity": {"type": "call", "title": "Call Mrs. Diallo"}},
            {"op": "update_status", "activity": "last", "status": "failed"},
            {"op": "update_status", "activity": "last", "status": "in-progress"},
            {"op": "list_activities", "filter": {"type": "call"}},
            {"op": "create_from_template", "template_id": "template_patient_reminder"},
            {"op": "list_workflows"}
        ]"#,
    );
    let script_arg = script.display().to_string();

    let output = clinic_output(&["session", "run", "--script", &script_arg]);
    assert!(output.status.success());
    let value = stdout_json(&output);

    assert_eq!(value["final_role"], json!("doctor"));
    let steps = match value["steps"].as_array() {
        Some(steps) => steps.clone(),
        None => panic!("steps must be an array: {value}"),
    };
    assert_eq!(steps.len(), 8);
    assert_eq!(steps[1]["result"]["granted"], json!(false));
    assert_eq!(
        steps[1]["result"]["denial"]["reason"],
        json!("Personnel management is restricted to administrators.")
    );
    assert_eq!(steps[3]["result"]["outcome"], json!("applied"));
    assert_eq!(steps[4]["result"]["outcome"], json!("applied"));
    assert_eq!(steps[5]["result"][0]["status"], json!("in-progress"));
    assert_eq!(steps[7]["result"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["notifications"].as_array().map(Vec::len), Some(1));

    let _ = fs::remove_file(script);
}
