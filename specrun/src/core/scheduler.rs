//! Spec scheduler: owns the collection and drives each spec's state machine.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::core::errors::{Ineligibility, SchedulerError};
use crate::core::policy::{attempt_block, is_attemptable, unmet_dependencies};
use crate::core::resolver::resolve_order;
use crate::core::summary::{BlockedSpec, StatusCounts};
use crate::core::types::{Spec, SpecResult, SpecStatus};

/// Owns a spec collection in dependency order.
///
/// All status and attempt changes go through [`Scheduler::mark_in_progress`]
/// and [`Scheduler::record_result`]. The scheduler has no internal locking;
/// independent graphs each need their own instance.
#[derive(Debug, Clone)]
pub struct Scheduler {
    specs: Vec<Spec>,
    index: HashMap<String, usize>,
    max_attempts: u32,
}

impl Scheduler {
    /// Order `specs` by dependencies and take ownership of them.
    ///
    /// Fails on a repeated id or a dependency cycle; no scheduler exists then.
    #[instrument(skip_all, fields(specs = specs.len(), max_attempts = max_attempts))]
    pub fn new(specs: Vec<Spec>, max_attempts: u32) -> Result<Self, SchedulerError> {
        let mut seen = HashSet::new();
        if let Some(dup) = specs.iter().find(|spec| !seen.insert(spec.id.as_str())) {
            return Err(SchedulerError::DuplicateId(dup.id.clone()));
        }
        let order = resolve_order(&specs)?;
        let mut slots: Vec<Option<Spec>> = specs.into_iter().map(Some).collect();
        let specs: Vec<Spec> = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();
        let index = specs
            .iter()
            .enumerate()
            .map(|(idx, spec)| (spec.id.clone(), idx))
            .collect();
        debug!(order = ?specs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), "resolved spec order");
        Ok(Self {
            specs,
            index,
            max_attempts,
        })
    }

    /// Specs in resolved evaluation order.
    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    pub fn get(&self, id: &str) -> Option<&Spec> {
        self.index.get(id).map(|&idx| &self.specs[idx])
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Every spec that may run now, in resolved order.
    pub fn runnable_specs(&self) -> Vec<&Spec> {
        self.specs
            .iter()
            .filter(|spec| is_attemptable(spec, self.max_attempts))
            .filter(|spec| unmet_dependencies(spec, &self.specs, &self.index).is_empty())
            .collect()
    }

    /// Transition a runnable spec to `InProgress`.
    ///
    /// Eligibility is recomputed at call time.
    pub fn mark_in_progress(&mut self, id: &str) -> Result<&Spec, SchedulerError> {
        let idx = self.position(id)?;
        if let Some(reason) = self.ineligibility(idx) {
            return Err(SchedulerError::NotEligible {
                id: id.to_string(),
                reason,
            });
        }

        let spec = &mut self.specs[idx];
        spec.status = SpecStatus::InProgress;
        debug!(spec_id = %spec.id, attempts = spec.attempts, "spec marked in progress");
        Ok(spec)
    }

    /// Record the outcome of an attempt and bump `attempts` by one.
    ///
    /// `Success` moves the spec to `Done`; anything else to `Failed`. Callers
    /// must pair each call with exactly one preceding `mark_in_progress` for the
    /// same spec; this precondition is not checked.
    pub fn record_result(&mut self, id: &str, result: &SpecResult) -> Result<&Spec, SchedulerError> {
        let idx = self.position(id)?;
        let spec = &mut self.specs[idx];
        spec.status = result.status.spec_status();
        spec.attempts += 1;
        debug!(
            spec_id = %spec.id,
            status = spec.status.as_str(),
            attempts = spec.attempts,
            "recorded result"
        );
        Ok(spec)
    }

    /// Per-status counts over the whole collection.
    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::from_specs(&self.specs)
    }

    /// Pending specs held back by dependencies that are not `Done`.
    pub fn blocked_specs(&self) -> Vec<BlockedSpec> {
        self.specs
            .iter()
            .filter(|spec| spec.status == SpecStatus::Pending)
            .filter_map(|spec| {
                let unmet = unmet_dependencies(spec, &self.specs, &self.index);
                if unmet.is_empty() {
                    return None;
                }
                Some(BlockedSpec {
                    id: spec.id.clone(),
                    title: spec.title.clone(),
                    unmet_dependencies: unmet.into_iter().map(str::to_string).collect(),
                })
            })
            .collect()
    }

    fn ineligibility(&self, idx: usize) -> Option<Ineligibility> {
        let spec = &self.specs[idx];
        if let Some(reason) = attempt_block(spec, self.max_attempts) {
            return Some(reason);
        }
        let unmet = unmet_dependencies(spec, &self.specs, &self.index);
        if unmet.is_empty() {
            return None;
        }
        Some(Ineligibility::DependenciesUnsatisfied {
            unmet: unmet.into_iter().map(str::to_string).collect(),
        })
    }

    fn position(&self, id: &str) -> Result<usize, SchedulerError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| SchedulerError::UnknownSpec(id.to_string()))
    }
}
