//! CLI tests for `specrun run`, `plan`, `doctor`, and `chat`.
//!
//! Spawns the specrun binary against the mock backend and verifies exit codes
//! and printed output.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use specrun::exit_codes;
use specrun::io::run_log::load_run_record;

const CHAIN: &str = "\
goal: Ship it
specs:
  - id: a
    title: First
    acceptance_criteria: [done]
  - id: b
    title: Second
    acceptance_criteria: [done]
    dependencies: [a]
";

fn specrun(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_specrun"))
        .current_dir(dir)
        .env_remove("SPECRUN_BACKEND")
        .env_remove("SPECRUN_TIMEOUT_SECS")
        .env_remove("CLAUDE_CODE_TIMEOUT")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("spawn specrun")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn workspace(specs: &str) -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("specs.yaml"), specs).expect("write specs");
    temp
}

fn mock_failure_config(dir: &Path) {
    fs::write(
        dir.join("specrun.toml"),
        "[mock]\nstatus = \"failure\"\nerror = \"mock failure\"\n",
    )
    .expect("write config");
}

#[test]
fn run_to_completion_exits_ok_and_writes_artifacts() {
    let temp = workspace(CHAIN);
    let output = specrun(
        temp.path(),
        &[
            "run",
            "--spec",
            "specs.yaml",
            "--max-steps",
            "5",
            "--summary-out",
            "out/summary.json",
            "--report",
            "out/report.md",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let printed = stdout(&output);
    assert!(printed.starts_with("Progress:\n"), "{printed}");
    assert!(printed.contains("Totals: completed=2, failed=0, pending=0"));
    assert!(printed.contains("Stopped: no_runnable_specs"));

    let record = load_run_record(&temp.path().join("out/summary.json")).expect("record");
    assert_eq!(record.summary.executed_ids(), vec!["a", "b"]);
    assert_eq!(record.context.goal, "Ship it");
    let report = fs::read_to_string(temp.path().join("out/report.md")).expect("report");
    assert!(report.contains("| 2 | b | Second | pass | 1 |"));
}

#[test]
fn step_budget_exhaustion_exits_with_max_steps_code() {
    let temp = workspace(CHAIN);
    let output = specrun(temp.path(), &["run", "--spec", "specs.yaml"]);
    assert_eq!(output.status.code(), Some(exit_codes::MAX_STEPS));
    assert!(stdout(&output).contains("Stopped: max_steps"));
}

#[test]
fn failing_step_exits_with_failure_code() {
    let temp = workspace(CHAIN);
    mock_failure_config(temp.path());
    let output = specrun(
        temp.path(),
        &["run", "--spec", "specs.yaml", "--max-steps", "5"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let printed = stdout(&output);
    assert!(printed.contains("Stopped: failure"));
    assert!(printed.contains("Error: mock failure"));
}

#[test]
fn blocked_dependents_exit_with_blocked_code() {
    let temp = workspace(CHAIN);
    mock_failure_config(temp.path());
    let output = specrun(
        temp.path(),
        &[
            "run",
            "--spec",
            "specs.yaml",
            "--max-steps",
            "5",
            "--continue-on-failure",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::BLOCKED));
    assert!(stdout(&output).contains("Blocked: b (waiting on: a)"));
}

#[test]
fn invalid_spec_file_exits_invalid_with_every_problem() {
    let temp = workspace("specs:\n  - id: a\n    title: A\n    acceptance_criteria: []\n    dependencies: [ghost]\n  - id: a\n    title: B\n    acceptance_criteria: []\n");
    let output = specrun(temp.path(), &["run", "--spec", "specs.yaml"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let err = stderr(&output);
    assert!(err.contains("Invalid spec file"), "{err}");
    assert!(err.contains("specs[1].id duplicates 'a' from specs[0].id"), "{err}");
    assert!(err.contains("unknown id 'ghost'"), "{err}");
}

#[test]
fn usage_errors_exit_invalid() {
    let temp = workspace(CHAIN);
    let output = specrun(temp.path(), &["run"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn plan_prints_resolved_order() {
    let temp = workspace(CHAIN);
    let output = specrun(temp.path(), &["plan", "--spec", "specs.yaml"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&output),
        "Goal: Ship it\nPlan:\n1. a - First\n2. b - Second (deps: a)\n"
    );
}

#[test]
fn doctor_reports_each_check() {
    let temp = workspace(CHAIN);
    let output = specrun(temp.path(), &["doctor", "--spec", "specs.yaml"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stdout(&output));
    let printed = stdout(&output);
    assert!(printed.contains("git: OK - git version"));
    assert!(printed.contains("spec: OK - specs.yaml (2 specs)"));
    assert!(printed.contains("backend: OK - mock backend available"));

    let output = specrun(
        temp.path(),
        &["doctor", "--spec", "missing.yaml", "--backend", "mock"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stdout(&output).contains("spec: FAIL - Spec file not found"));
}

#[test]
fn chat_echoes_through_mock_backend() {
    let temp = workspace(CHAIN);
    let output = specrun(temp.path(), &["chat", "--prompt", "hello"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "[mock] hello\n");
}

#[test]
fn state_flag_writes_repository_snapshot() {
    let repo = specrun::test_support::TestRepo::new().expect("repo");
    repo.commit_file("specs.yaml", CHAIN).expect("commit specs");
    let output = specrun(
        repo.root(),
        &["run", "--spec", "specs.yaml", "--max-steps", "5", "--state", "state.json"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert!(stdout(&output).contains("State written to state.json"));

    let state = specrun::io::project_state::load_project_state(&repo.root().join("state.json"))
        .expect("state");
    assert_eq!(state.tracked_files, vec!["specs.yaml"]);
    assert_eq!(state.status_summary, "clean");
    assert_eq!(state.history.len(), 2);
}
