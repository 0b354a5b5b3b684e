//! Integration tests for VBG
//!
//! These tests drive the orchestrator end to end with real child processes:
//! - vbg-tools: agent invocation, timeouts, missing binaries
//! - vbg-core: file selection, sessions, report merging and persistence
//!
//! Agents are small `sh` scripts, so these tests only run on unix.

#![cfg(unix)]

use std::fs;
use std::path::Path;

use vbg_core::{
    AgentConfig, AgentRole, ExecutionMode, Orchestrator, SessionChoice, SessionRef, SessionStore,
    TaskMode, TaskRequest, TaskState, VbgConfig,
};
use vbg_tools::{CompletionKind, PromptDelivery};

// ============================================================================
// Helpers
// ============================================================================

/// Agent running `script` under `sh`, prompt on stdin
fn script_agent(script: &str) -> AgentConfig {
    let mut agent = AgentConfig::new("sh");
    agent.args = vec!["-c".to_string(), script.to_string()];
    agent.prompt_via = PromptDelivery::Stdin;
    agent
}

fn config_with(primary: AgentConfig, auditor: AgentConfig) -> VbgConfig {
    let mut config = VbgConfig::default();
    config.agents.clear();
    config.agents.insert("alpha".to_string(), primary);
    config.agents.insert("beta".to_string(), auditor);
    config.roles.primary = "alpha".to_string();
    config.roles.auditor = "beta".to_string();
    config.execution.timeout_secs = 10;
    config
}

fn rust_project(root: &Path) {
    fs::write(root.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn add(a: i32, b: i32) -> i32 { a + b }\n").unwrap();
}

// ============================================================================
// Cross-check flow
// ============================================================================

#[tokio::test]
async fn test_parallel_cross_check_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let config = config_with(
        script_agent("cat > /dev/null; echo primary-answer"),
        script_agent("cat > /dev/null; echo auditor-answer"),
    );
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let outcome = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "Where is add defined?"))
        .await
        .unwrap();
    let report = &outcome.report;

    assert!(!report.degraded);
    assert_eq!(report.final_state(), TaskState::Done);
    assert_eq!(report.roles.len(), 2);
    assert_eq!(report.roles[0].role, AgentRole::Primary);
    assert_eq!(report.roles[1].role, AgentRole::Auditor);
    assert_eq!(
        report.roles[0].result().unwrap().output.trim(),
        "primary-answer"
    );
    assert_eq!(
        report.roles[1].result().unwrap().output.trim(),
        "auditor-answer"
    );
    assert!(report
        .selected_files
        .iter()
        .any(|p| p == Path::new("src/lib.rs")));

    let path = outcome.report_path.expect("report saved");
    let saved = fs::read_to_string(path).unwrap();
    assert!(saved.contains("primary-answer"));
    assert!(saved.contains("auditor-answer"));
}

#[tokio::test]
async fn test_prompt_reaches_agent_as_argument() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let mut echo = AgentConfig::new("sh");
    echo.args = vec![
        "-c".to_string(),
        "printf '%s' \"$1\" | grep -q 'unique-question-marker' && echo seen".to_string(),
        "sh".to_string(),
        "{prompt}".to_string(),
    ];
    let mut config = config_with(echo, script_agent("cat > /dev/null; echo ok"));
    config.roles.auditor = String::new();
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let outcome = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "unique-question-marker?"))
        .await
        .unwrap();

    assert_eq!(outcome.report.roles.len(), 1);
    assert_eq!(
        outcome.report.roles[0].result().unwrap().output.trim(),
        "seen"
    );
}

#[tokio::test]
async fn test_missing_auditor_binary_degrades() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let config = config_with(
        script_agent("cat > /dev/null; echo primary-answer"),
        AgentConfig::new("vbg-definitely-missing-agent"),
    );
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let outcome = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "anything"))
        .await
        .unwrap();
    let report = &outcome.report;

    assert!(report.degraded);
    assert!(report.transitions.contains(&TaskState::Degraded));
    assert_eq!(report.final_state(), TaskState::Done);
    assert!(report.roles[0].is_usable());
    assert_eq!(
        report.roles[1].result().unwrap().kind,
        CompletionKind::NotFound
    );
}

#[tokio::test]
async fn test_agent_timeout_keeps_other_result() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let mut slow = script_agent("sleep 30");
    slow.timeout_secs = Some(1);
    let config = config_with(slow, script_agent("cat > /dev/null; echo auditor-answer"));
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let started = std::time::Instant::now();
    let outcome = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "anything"))
        .await
        .unwrap();

    assert!(started.elapsed() < std::time::Duration::from_secs(20));
    let report = &outcome.report;
    assert!(report.degraded);
    assert_eq!(
        report.roles[0].result().unwrap().kind,
        CompletionKind::TimedOut
    );
    assert_eq!(
        report.roles[1].result().unwrap().output.trim(),
        "auditor-answer"
    );
}

#[tokio::test]
async fn test_nonzero_exit_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let config = config_with(
        script_agent("cat > /dev/null; echo boom >&2; exit 3"),
        script_agent("cat > /dev/null; echo fine"),
    );
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let outcome = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "anything"))
        .await
        .unwrap();

    let primary = outcome.report.roles[0].result().unwrap();
    assert_eq!(primary.kind, CompletionKind::Failed);
    assert_eq!(primary.exit_code, Some(3));
    assert!(outcome.report.degraded);
}

#[tokio::test]
async fn test_sequential_auditor_sees_primary_output() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let mut config = config_with(
        script_agent("cat > /dev/null; echo primary-draft-42"),
        script_agent("grep -q 'primary-draft-42' && echo seen"),
    );
    config.execution.mode = ExecutionMode::Sequential;
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let outcome = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "review this"))
        .await
        .unwrap();

    assert_eq!(
        outcome.report.roles[1].result().unwrap().output.trim(),
        "seen"
    );
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_session_history_carries_into_next_task() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    // The auditor reports whether the previous answer appears in its prompt
    let config = config_with(
        script_agent("cat > /dev/null; echo remembered-fact"),
        script_agent("grep -c 'remembered-fact' || true"),
    );
    let session_config = config.session.clone();
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let first = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "first question"))
        .await
        .unwrap();
    assert_eq!(first.report.roles[1].result().unwrap().output.trim(), "0");

    let second = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "second question"))
        .await
        .unwrap();
    assert_eq!(second.report.session_id, first.report.session_id);
    assert_ne!(second.report.roles[1].result().unwrap().output.trim(), "0");

    let store = SessionStore::from_config(&session_config, dir.path());
    let session = store.load(SessionRef::Current).unwrap();
    assert_eq!(session.id(), first.report.session_id);
    // task + two agents, twice
    assert_eq!(session.entries().len(), 6);
    assert_eq!(session.stats().tasks, 2);
    assert_eq!(session.stats().agent_calls.get("alpha"), Some(&2));
}

#[tokio::test]
async fn test_new_session_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let config = config_with(
        script_agent("cat > /dev/null; echo a"),
        script_agent("cat > /dev/null; echo b"),
    );
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let first = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "one"))
        .await
        .unwrap();
    let second = orchestrator
        .run(TaskRequest::new(TaskMode::Analyze, "two").with_session(SessionChoice::New))
        .await
        .unwrap();

    assert_ne!(first.report.session_id, second.report.session_id);
    let sessions = orchestrator.list_sessions().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, second.report.session_id);
}

// ============================================================================
// Modes
// ============================================================================

#[tokio::test]
async fn test_plan_mode_writes_plan_file() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let config = config_with(
        script_agent("cat > /dev/null; echo '# Plan'; echo '1. do it'"),
        script_agent("cat > /dev/null; echo looks-fine"),
    );
    let plan_file = config.output.plan_file.clone();
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let outcome = orchestrator
        .run(TaskRequest::new(TaskMode::Plan, "add a subtract function"))
        .await
        .unwrap();

    let path = outcome.plan_path.expect("plan written");
    assert_eq!(path, dir.path().join(plan_file));
    let plan = fs::read_to_string(path).unwrap();
    assert!(plan.contains("1. do it"));
}

#[tokio::test]
async fn test_ui_mode_rejected_for_rust_project() {
    let dir = tempfile::tempdir().unwrap();
    rust_project(dir.path());

    let config = config_with(
        script_agent("cat > /dev/null; echo a"),
        script_agent("cat > /dev/null; echo b"),
    );
    let session_dir = dir.path().join(&config.session.dir);
    let orchestrator = Orchestrator::new(config, dir.path()).unwrap();

    let err = orchestrator
        .run(TaskRequest::new(TaskMode::UiReview, ""))
        .await
        .unwrap_err();

    assert!(matches!(err, vbg_core::Error::UnsupportedMode { .. }));
    assert!(!session_dir.exists());
}
