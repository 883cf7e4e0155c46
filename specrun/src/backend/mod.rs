//! Pluggable executors that turn a spec into a [`SpecResult`].
//!
//! The execution loop only ever calls [`Backend::execute`]. Implementations
//! must fold every failure (missing executable, timeout, bad output) into a
//! result with status `Failure` and a readable `error`; they never panic and
//! never return `Err` from `execute`.

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::delta::FileDelta;
use crate::core::payload::{dedup_paths, merge_notes};
use crate::core::types::{RunContext, Spec, SpecResult};
use crate::io::config::RunnerConfig;
use crate::io::process::{find_executable, run_command_with_timeout};

pub mod claude;
pub mod codex;
pub mod mock;

pub use claude::ClaudeBackend;
pub use codex::CodexBackend;
pub use mock::MockBackend;

/// Executor contract used by the orchestrator.
pub trait Backend {
    /// Short name recorded in run context and reports.
    fn name(&self) -> &str;

    /// Run one attempt of `spec`. Never fails; failures are results.
    fn execute(&self, spec: &Spec, context: &RunContext) -> SpecResult;

    /// Free-form prompt without spec framing or structured output.
    fn chat(&self, prompt: &str, cwd: Option<&Path>) -> Result<String>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self, spec: &Spec, context: &RunContext) -> SpecResult {
        (**self).execute(spec, context)
    }

    fn chat(&self, prompt: &str, cwd: Option<&Path>) -> Result<String> {
        (**self).chat(prompt, cwd)
    }
}

/// Selectable backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Mock,
    Codex,
    Claude,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Mock => "mock",
            BackendKind::Codex => "codex",
            BackendKind::Claude => "claude",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(BackendKind::Mock),
            "codex" => Ok(BackendKind::Codex),
            "claude" => Ok(BackendKind::Claude),
            other => Err(format!(
                "unknown backend '{other}' (expected one of: mock, codex, claude)"
            )),
        }
    }
}

/// Bounds applied to every backend subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    /// Used by `chat`; `execute` takes its timeout from the run context.
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ProcessLimits {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

/// Build the backend selected by `kind` from resolved configuration.
pub fn create_backend(kind: BackendKind, config: &RunnerConfig) -> Box<dyn Backend> {
    let limits = ProcessLimits::from_config(config);
    match kind {
        BackendKind::Mock => Box::new(MockBackend::new(config.mock.clone())),
        BackendKind::Codex => Box::new(CodexBackend::new(config.codex.clone(), limits)),
        BackendKind::Claude => Box::new(ClaudeBackend::new(config.claude.clone(), limits)),
    }
}

/// Outcome of a backend subprocess that exited zero within its timeout.
struct ToolOutput {
    stdout: String,
}

/// Why a backend subprocess produced no usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ToolFailure {
    NotFound,
    Spawn(String),
    TimedOut(u64),
    Exit { code: Option<i32>, output: String },
}

/// Run `executable` with `args` in `cwd`, classifying every failure.
fn run_tool(
    executable: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ToolOutput, ToolFailure> {
    let program = find_executable(executable).ok_or(ToolFailure::NotFound)?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = run_command_with_timeout(cmd, timeout, output_limit_bytes)
        .map_err(|err| ToolFailure::Spawn(format!("{err:#}")))?;
    if output.timed_out {
        return Err(ToolFailure::TimedOut(timeout.as_secs()));
    }
    if !output.status.success() {
        let stderr = output.stderr_text();
        let stdout = output.stdout_text();
        let code = output.status.code();
        let text = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match code {
                Some(code) => format!("Exit code {code}"),
                None => "terminated by signal".to_string(),
            });
        return Err(ToolFailure::Exit { code, output: text });
    }
    Ok(ToolOutput {
        stdout: output.stdout_text(),
    })
}

impl ToolFailure {
    /// Fold into a failure result; `tool` is the display name, `hint` extra install help.
    fn into_result(self, tool: &str, executable: &str, hint: &str) -> SpecResult {
        let (summary, error) = self.describe(tool, executable, hint);
        warn!(tool, error = %error, "backend invocation failed");
        SpecResult::failure(summary, error)
    }

    fn describe(self, tool: &str, executable: &str, hint: &str) -> (String, String) {
        match self {
            ToolFailure::NotFound => (
                format!("{tool} CLI not found"),
                format!("{tool} CLI not found: '{executable}'. {hint}"),
            ),
            ToolFailure::Spawn(err) => (
                format!("{tool} could not be started"),
                format!("{tool} could not be started: {err}"),
            ),
            ToolFailure::TimedOut(secs) => (
                format!("{tool} timed out"),
                format!("{tool} timed out after {secs} seconds."),
            ),
            ToolFailure::Exit { code, output } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                (
                    format!("{tool} exited with non-zero status"),
                    format!("{tool} failed (exit {code}): {output}"),
                )
            }
        }
    }

    fn into_error(self, tool: &str, executable: &str, hint: &str) -> anyhow::Error {
        let (_, error) = self.describe(tool, executable, hint);
        anyhow::anyhow!(error)
    }
}

/// Fill `files_changed` from the repository delta unless the payload reported
/// files itself, and append any snapshot warning to `details`.
fn apply_delta(mut result: SpecResult, reported_files: bool, delta: FileDelta) -> SpecResult {
    if !reported_files {
        result.files_changed = delta.files;
    }
    result.files_changed = dedup_paths(std::mem::take(&mut result.files_changed));
    if let Some(warning) = delta.warning {
        result.details = merge_notes(&result.details, &[warning]);
    }
    result
}
