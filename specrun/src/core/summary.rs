//! Run summary types: the sole externally consumed artifact of a run.

use serde::{Deserialize, Serialize};

use crate::core::types::{Spec, SpecResult, SpecStatus};

/// Why the execution loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left that may run (finished, or blocked).
    NoRunnableSpecs,
    /// A non-success result arrived while stopping on failure.
    Failure,
    /// The step budget ran out while runnable work remained.
    MaxSteps,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::NoRunnableSpecs => "no_runnable_specs",
            StopReason::Failure => "failure",
            StopReason::MaxSteps => "max_steps",
        }
    }
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Zero-based step index.
    pub index: u32,
    pub spec_id: String,
    pub title: String,
    pub result: SpecResult,
    /// The spec's attempt count after this step was recorded.
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn from_specs(specs: &[Spec]) -> Self {
        let mut counts = Self::default();
        for spec in specs {
            match spec.status {
                SpecStatus::Done => counts.completed += 1,
                SpecStatus::Failed => counts.failed += 1,
                SpecStatus::Pending => counts.pending += 1,
                SpecStatus::InProgress => counts.in_progress += 1,
                SpecStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}

/// A pending spec that cannot run because some dependency is not `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSpec {
    pub id: String,
    pub title: String,
    pub unmet_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub steps: u32,
    pub history: Vec<StepRecord>,
    /// Final snapshot of every spec, in resolved order.
    pub specs: Vec<Spec>,
    pub counts: StatusCounts,
    pub stop_reason: StopReason,
    /// Error text of the step that triggered a `failure` stop.
    #[serde(default)]
    pub failure_error: Option<String>,
    #[serde(default)]
    pub blocked: Vec<BlockedSpec>,
}

impl ExecutionSummary {
    /// True when the run ended with nothing runnable but pending specs remain.
    pub fn is_blocked(&self) -> bool {
        self.stop_reason == StopReason::NoRunnableSpecs && !self.blocked.is_empty()
    }

    /// Spec ids in execution order (one entry per step).
    pub fn executed_ids(&self) -> Vec<&str> {
        self.history
            .iter()
            .map(|step| step.spec_id.as_str())
            .collect()
    }
}
