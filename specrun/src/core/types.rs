//! Shared deterministic types for the scheduling core.
//!
//! These types define stable contracts between the scheduler, the execution
//! loop, and backends. They do not depend on external state or I/O, and their
//! serialized forms are part of the run-log format.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a spec.
///
/// `Pending -> InProgress -> {Done, Failed}`; `Failed -> InProgress` while
/// attempts remain. `Done` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    Pending,
    InProgress,
    Done,
    Failed,
    Skipped,
}

impl SpecStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecStatus::Pending => "pending",
            SpecStatus::InProgress => "in_progress",
            SpecStatus::Done => "done",
            SpecStatus::Failed => "failed",
            SpecStatus::Skipped => "skipped",
        }
    }
}

/// Outcome status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Partial,
    Failure,
    Error,
}

impl ResultStatus {
    pub const ALL: [ResultStatus; 4] = [
        ResultStatus::Success,
        ResultStatus::Partial,
        ResultStatus::Failure,
        ResultStatus::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Partial => "partial",
            ResultStatus::Failure => "failure",
            ResultStatus::Error => "error",
        }
    }

    /// Parse a textual outcome (case-insensitive, surrounding whitespace ignored).
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|status| status.as_str() == lowered)
    }

    /// Spec status this outcome maps to when recorded by the scheduler.
    pub fn spec_status(self) -> SpecStatus {
        match self {
            ResultStatus::Success => SpecStatus::Done,
            ResultStatus::Partial | ResultStatus::Failure | ResultStatus::Error => {
                SpecStatus::Failed
            }
        }
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_status")]
    pub status: SpecStatus,
    #[serde(default)]
    pub attempts: u32,
}

fn default_status() -> SpecStatus {
    SpecStatus::Pending
}

impl Spec {
    /// A fresh spec: `Pending`, zero attempts, no dependencies.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            dependencies: Vec::new(),
            status: SpecStatus::Pending,
            attempts: 0,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

/// Aggregated outcome of one execution attempt on a spec.
///
/// By convention `error` is set when `status` is `Failure` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecResult {
    pub status: ResultStatus,
    pub summary: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub commands_run: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,
}

impl SpecResult {
    pub fn success(summary: impl Into<String>) -> Self {
        Self::with_status(ResultStatus::Success, summary)
    }

    pub fn failure(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(ResultStatus::Failure, summary)
        }
    }

    pub fn with_status(status: ResultStatus, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            details: String::new(),
            files_changed: Vec::new(),
            commands_run: Vec::new(),
            error: None,
            structured_output: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// Immutable execution environment handed to backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub repo_path: PathBuf,
    pub spec_path: PathBuf,
    pub goal: String,
    pub backend_name: String,
    pub run_id: String,
    /// Zero-based index of the step being executed.
    pub step: u32,
    /// Step budget for the run.
    pub max_steps: u32,
    /// Upper bound on a single backend invocation.
    pub timeout_secs: u64,
}

impl RunContext {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Copy of this context positioned at `step`.
    pub fn at_step(&self, step: u32) -> Self {
        Self {
            step,
            ..self.clone()
        }
    }
}

/// Generate a short random run identifier.
pub fn new_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
