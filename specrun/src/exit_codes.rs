//! Stable exit codes for specrun CLI commands.

use crate::core::summary::{ExecutionSummary, StopReason};

/// All runnable work finished, or a non-run command succeeded.
pub const OK: i32 = 0;
/// Invalid input, configuration, or environment.
pub const INVALID: i32 = 1;
/// `specrun run` stopped on a failed step.
pub const FAILURE: i32 = 2;
/// `specrun run` used its step budget with runnable work left.
pub const MAX_STEPS: i32 = 3;
/// `specrun run` ended with pending specs whose dependencies can never complete.
pub const BLOCKED: i32 = 4;

/// Exit code for a finished run.
pub fn for_summary(summary: &ExecutionSummary) -> i32 {
    match summary.stop_reason {
        StopReason::Failure => FAILURE,
        StopReason::MaxSteps => MAX_STEPS,
        StopReason::NoRunnableSpecs if summary.is_blocked() => BLOCKED,
        StopReason::NoRunnableSpecs => OK,
    }
}
