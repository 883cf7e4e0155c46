//! Orchestration for `specrun run`.
//!
//! Loads the spec file and layered configuration, drives the execution loop
//! against the configured backend, then writes the optional run artifacts,
//! repository snapshot and auto-commit. Printing is left to the caller.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, instrument, warn};

use crate::backend::create_backend;
use crate::core::scheduler::Scheduler;
use crate::core::summary::{ExecutionSummary, StepRecord};
use crate::core::types::{RunContext, new_run_id};
use crate::exit_codes;
use crate::io::config::{CONFIG_FILE_NAME, ConfigOverrides, RunnerConfig, load_config, resolve};
use crate::io::git::Git;
use crate::io::project_state::{build_project_state, save_project_state};
use crate::io::run_log::{RunRecord, write_atomic, write_run_record};
use crate::io::spec_file::load_spec_file;
use crate::orchestrator::{RunOptions, run};
use crate::report::render_report;

const SUMMARY_WIDTH: usize = 60;

/// Everything `specrun run` was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub spec_path: PathBuf,
    /// Working directory handed to backends; also where `specrun.toml` is looked up.
    pub repo_path: PathBuf,
    pub config_path: Option<PathBuf>,
    /// Overrides the spec file's goal.
    pub goal: Option<String>,
    pub overrides: ConfigOverrides,
    pub summary_out: Option<PathBuf>,
    pub report_out: Option<PathBuf>,
    /// Write a repository snapshot with the run's results here.
    pub state_out: Option<PathBuf>,
    pub auto_commit: bool,
    pub commit_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Created,
    /// Nothing tracked had changed.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOutcome {
    Written(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub context: RunContext,
    pub summary: ExecutionSummary,
    pub state: Option<StateOutcome>,
    pub commit: Option<CommitOutcome>,
}

impl RunOutcome {
    /// A failed snapshot or auto-commit outranks the run's own result.
    pub fn exit_code(&self) -> i32 {
        let state_failed = matches!(self.state, Some(StateOutcome::Failed(_)));
        let commit_failed = matches!(self.commit, Some(CommitOutcome::Failed(_)));
        if state_failed || commit_failed {
            exit_codes::INVALID
        } else {
            exit_codes::for_summary(&self.summary)
        }
    }
}

/// Read `specrun.toml` (explicit path, or the one in `repo_path`) and apply
/// environment and command-line layers.
pub fn load_runner_config(
    repo_path: &Path,
    config_path: Option<&Path>,
    env: impl FnMut(&str) -> Option<String>,
    overrides: &ConfigOverrides,
) -> Result<RunnerConfig> {
    let file_config = match config_path {
        Some(path) => {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
            load_config(path)?
        }
        None => load_config(&repo_path.join(CONFIG_FILE_NAME))?,
    };
    resolve(file_config, env, overrides).context("resolve configuration")
}

/// Execute a full run. `on_step` sees each step as soon as it is recorded.
///
/// Setup problems (spec file, configuration, dependency cycles) and artifact
/// write failures are errors; execution failures are part of the summary.
#[instrument(skip_all, fields(spec = %request.spec_path.display()))]
pub fn execute_run<F>(
    request: &RunRequest,
    env: impl FnMut(&str) -> Option<String>,
    on_step: F,
) -> Result<RunOutcome>
where
    F: FnMut(&StepRecord),
{
    let collection = load_spec_file(&request.spec_path)?;
    let config = load_runner_config(
        &request.repo_path,
        request.config_path.as_deref(),
        env,
        &request.overrides,
    )?;
    let mut scheduler =
        Scheduler::new(collection.specs, config.max_attempts).context("resolve spec order")?;

    let goal = request
        .goal
        .as_deref()
        .map(str::trim)
        .filter(|goal| !goal.is_empty())
        .map(str::to_string)
        .or(collection.goal)
        .unwrap_or_else(|| "unspecified".to_string());
    let context = RunContext {
        repo_path: request.repo_path.clone(),
        spec_path: request
            .spec_path
            .canonicalize()
            .unwrap_or_else(|_| request.spec_path.clone()),
        goal,
        backend_name: config.backend.as_str().to_string(),
        run_id: new_run_id(),
        step: 0,
        max_steps: config.max_steps,
        timeout_secs: config.timeout_secs,
    };
    info!(run_id = %context.run_id, backend = %context.backend_name, "starting run");

    let backend = create_backend(config.backend, &config);
    let options = RunOptions {
        max_steps: config.max_steps,
        stop_on_failure: config.stop_on_failure,
    };
    let summary = run(&mut scheduler, backend.as_ref(), &context, options, on_step)?;

    if let Some(path) = &request.report_out {
        write_atomic(path, &render_report(&summary, &context))
            .with_context(|| format!("write report {}", path.display()))?;
    }
    let record = RunRecord { context, summary };
    if let Some(path) = &request.summary_out {
        write_run_record(path, &record)?;
    }
    let RunRecord { context, summary } = record;

    let state = request
        .state_out
        .as_deref()
        .map(|path| match write_project_state(&context.repo_path, path, &summary) {
            Ok(path) => StateOutcome::Written(path),
            Err(err) => {
                warn!(err = %err, "project state snapshot failed");
                StateOutcome::Failed(format!("{err:#}"))
            }
        });

    let commit = request.auto_commit.then(|| {
        let git = Git::new(&context.repo_path);
        match git.auto_commit(&commit_message(&summary, &context.goal), request.commit_prefix.as_deref()) {
            Ok(true) => CommitOutcome::Created,
            Ok(false) => CommitOutcome::Skipped,
            Err(err) => {
                warn!(err = %err, "auto-commit failed");
                CommitOutcome::Failed(format!("{err:#}"))
            }
        }
    });

    Ok(RunOutcome {
        context,
        summary,
        state,
        commit,
    })
}

fn write_project_state(repo_path: &Path, path: &Path, summary: &ExecutionSummary) -> Result<PathBuf> {
    let mut state = build_project_state(repo_path)?;
    state.history = summary.history.iter().map(|step| step.result.clone()).collect();
    save_project_state(&state, Some(path))
}

fn commit_message(summary: &ExecutionSummary, goal: &str) -> String {
    match summary.specs.first() {
        Some(spec) => format!("specrun run: {}", spec.title),
        None => format!("specrun run: {goal}"),
    }
}

/// Plain-text progress table and totals printed after a run.
pub fn render_progress(summary: &ExecutionSummary) -> String {
    let mut out = String::from("Progress:\n");
    if summary.history.is_empty() {
        out.push_str("No steps executed.\n");
    } else {
        let rows: Vec<[String; 5]> = summary
            .history
            .iter()
            .map(|step| {
                [
                    (step.index + 1).to_string(),
                    step.spec_id.clone(),
                    step.result.status.as_str().to_string(),
                    step.attempts.to_string(),
                    shorten(&step.result.summary, SUMMARY_WIDTH),
                ]
            })
            .collect();
        out.push_str(&render_table(["Step", "Spec", "Status", "Attempts", "Summary"], &rows));
    }
    let counts = &summary.counts;
    out.push_str(&format!(
        "Totals: completed={}, failed={}, pending={}, in_progress={}, skipped={}\n",
        counts.completed, counts.failed, counts.pending, counts.in_progress, counts.skipped
    ));
    out.push_str(&format!("Stopped: {}\n", summary.stop_reason.as_str()));
    if let Some(error) = &summary.failure_error {
        out.push_str(&format!("Error: {error}\n"));
    }
    for blocked in &summary.blocked {
        out.push_str(&format!(
            "Blocked: {} (waiting on: {})\n",
            blocked.id,
            blocked.unmet_dependencies.join(", ")
        ));
    }
    out
}

fn render_table<const N: usize>(headers: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.map(|header| header.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let header = line(headers.to_vec());
    let mut out = format!("{header}\n{}\n", "-".repeat(header.chars().count()));
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

/// Collapse whitespace and cut to `width` characters, ending in `...` when cut.
fn shorten(text: &str, width: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }
    let kept: String = collapsed.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
