//! Runnability rules: which specs may be attempted right now.

use std::collections::HashMap;

use crate::core::errors::Ineligibility;
use crate::core::types::{Spec, SpecStatus};

/// Returns why `spec` cannot be attempted, ignoring dependencies.
pub fn attempt_block(spec: &Spec, max_attempts: u32) -> Option<Ineligibility> {
    match spec.status {
        SpecStatus::Pending => None,
        SpecStatus::Failed if spec.attempts < max_attempts => None,
        SpecStatus::Failed => Some(Ineligibility::AttemptsExhausted {
            attempts: spec.attempts,
            max_attempts,
        }),
        status @ (SpecStatus::Done | SpecStatus::InProgress | SpecStatus::Skipped) => {
            Some(Ineligibility::Status(status))
        }
    }
}

/// `Pending` specs always qualify; `Failed` ones only while attempts remain.
pub fn is_attemptable(spec: &Spec, max_attempts: u32) -> bool {
    attempt_block(spec, max_attempts).is_none()
}

/// Dependency ids of `spec` that are not (yet) `Done`.
///
/// Ids that do not resolve within the collection count as unmet.
pub fn unmet_dependencies<'a>(
    spec: &'a Spec,
    specs: &[Spec],
    index: &HashMap<String, usize>,
) -> Vec<&'a str> {
    spec.dependencies
        .iter()
        .filter(|dep| {
            index
                .get(dep.as_str())
                .and_then(|&idx| specs.get(idx))
                .is_none_or(|dep_spec| dep_spec.status != SpecStatus::Done)
        })
        .map(String::as_str)
        .collect()
}

pub fn dependencies_satisfied(
    spec: &Spec,
    specs: &[Spec],
    index: &HashMap<String, usize>,
) -> bool {
    unmet_dependencies(spec, specs, index).is_empty()
}
