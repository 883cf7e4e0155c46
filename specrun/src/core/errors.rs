//! Typed errors raised by the scheduling core.
//!
//! Only graph construction and eligibility problems surface as errors.
//! Execution failures are ordinary [`SpecResult`](crate::core::types::SpecResult)s.

use thiserror::Error;

use crate::core::types::SpecStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("circular dependency detected in spec graph (unresolved: {})", .unresolved.join(", "))]
    CircularDependency { unresolved: Vec<String> },

    #[error("duplicate spec id: {0}")]
    DuplicateId(String),

    #[error("unknown spec id: {0}")]
    UnknownSpec(String),

    #[error("spec '{id}' is not eligible to run: {reason}")]
    NotEligible { id: String, reason: Ineligibility },
}

/// Why a spec cannot be marked in progress right now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ineligibility {
    #[error("status is {}", .0.as_str())]
    Status(SpecStatus),

    #[error("attempts exhausted ({attempts}/{max_attempts})")]
    AttemptsExhausted { attempts: u32, max_attempts: u32 },

    #[error("dependencies not satisfied: {}", .unmet.join(", "))]
    DependenciesUnsatisfied { unmet: Vec<String> },
}
