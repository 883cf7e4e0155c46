//! Execution loop: select, mark, execute, record, repeat.
//!
//! One backend call happens per iteration and each result is recorded before
//! runnability is evaluated again, so dependents never start early.

use tracing::{debug, info, instrument, warn};

use crate::backend::Backend;
use crate::core::errors::SchedulerError;
use crate::core::scheduler::Scheduler;
use crate::core::summary::{ExecutionSummary, StepRecord, StopReason};
use crate::core::types::{RunContext, Spec};

/// Strategy picking the next spec among the runnable ones.
pub trait SpecSelector {
    /// `runnable` is non-empty and in resolved order. Returning `None` ends the run.
    fn select<'a>(&mut self, runnable: &[&'a Spec]) -> Option<&'a Spec>;
}

/// Picks the first runnable spec in resolved order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstRunnable;

impl SpecSelector for FirstRunnable {
    fn select<'a>(&mut self, runnable: &[&'a Spec]) -> Option<&'a Spec> {
        runnable.first().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Step budget; `0` performs no iterations.
    pub max_steps: u32,
    /// Stop at the first result that is not `Success`.
    pub stop_on_failure: bool,
}

/// Run the loop with the default first-runnable selection.
pub fn run<B, F>(
    scheduler: &mut Scheduler,
    backend: &B,
    context: &RunContext,
    options: RunOptions,
    on_step: F,
) -> Result<ExecutionSummary, SchedulerError>
where
    B: Backend + ?Sized,
    F: FnMut(&StepRecord),
{
    run_with_selector(scheduler, backend, &mut FirstRunnable, context, options, on_step)
}

/// Drive `scheduler` to completion, the step budget, or a failure stop.
///
/// `on_step` observes each step record as soon as it is appended. Only
/// scheduler contract violations are returned as errors.
#[instrument(skip_all, fields(run_id = %context.run_id, backend = backend.name(), max_steps = options.max_steps))]
pub fn run_with_selector<B, S, F>(
    scheduler: &mut Scheduler,
    backend: &B,
    selector: &mut S,
    context: &RunContext,
    options: RunOptions,
    mut on_step: F,
) -> Result<ExecutionSummary, SchedulerError>
where
    B: Backend + ?Sized,
    S: SpecSelector + ?Sized,
    F: FnMut(&StepRecord),
{
    let mut history: Vec<StepRecord> = Vec::new();
    let mut failure_error: Option<String> = None;
    let mut stop_reason = StopReason::NoRunnableSpecs;

    for step in 0..options.max_steps {
        let spec_id = {
            let runnable = scheduler.runnable_specs();
            if runnable.is_empty() {
                debug!(step, "no runnable specs");
                break;
            }
            match selector.select(&runnable) {
                Some(spec) => spec.id.clone(),
                None => {
                    debug!(step, "selector chose nothing");
                    break;
                }
            }
        };

        let spec = scheduler.mark_in_progress(&spec_id)?.clone();
        info!(step, spec_id = %spec.id, attempt = spec.attempts + 1, "executing spec");
        let result = backend.execute(&spec, &context.at_step(step));
        let attempts = scheduler.record_result(&spec.id, &result)?.attempts;

        let record = StepRecord {
            index: step,
            spec_id: spec.id,
            title: spec.title,
            result,
            attempts,
        };
        on_step(&record);
        let failed = !record.result.is_success();
        if failed {
            warn!(
                step,
                spec_id = %record.spec_id,
                status = record.result.status.as_str(),
                "spec did not succeed"
            );
        }
        let error = record.result.error.clone();
        history.push(record);

        if failed && options.stop_on_failure {
            stop_reason = StopReason::Failure;
            failure_error = error;
            break;
        }
        if step + 1 == options.max_steps && !scheduler.runnable_specs().is_empty() {
            stop_reason = StopReason::MaxSteps;
        }
    }

    let summary = ExecutionSummary {
        steps: history.len() as u32,
        history,
        specs: scheduler.specs().to_vec(),
        counts: scheduler.status_counts(),
        stop_reason,
        failure_error,
        blocked: scheduler.blocked_specs(),
    };
    info!(
        steps = summary.steps,
        stop_reason = summary.stop_reason.as_str(),
        "run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ResultStatus, SpecResult, SpecStatus};
    use crate::test_support::{ScriptedBackend, context, spec};

    fn options(max_steps: u32, stop_on_failure: bool) -> RunOptions {
        RunOptions {
            max_steps,
            stop_on_failure,
        }
    }

    struct LastRunnable;

    impl SpecSelector for LastRunnable {
        fn select<'a>(&mut self, runnable: &[&'a Spec]) -> Option<&'a Spec> {
            runnable.last().copied()
        }
    }

    struct NeverSelect;

    impl SpecSelector for NeverSelect {
        fn select<'a>(&mut self, _runnable: &[&'a Spec]) -> Option<&'a Spec> {
            None
        }
    }

    #[test]
    fn budget_exhausted_with_work_left_is_max_steps() {
        let mut scheduler =
            Scheduler::new(vec![spec("a", &[]), spec("b", &[])], 1).expect("scheduler");
        let backend = ScriptedBackend::always(ResultStatus::Success);
        let summary =
            run(&mut scheduler, &backend, &context(), options(1, true), |_| {}).expect("run");
        assert_eq!(summary.stop_reason, StopReason::MaxSteps);
        assert_eq!(summary.executed_ids(), vec!["a"]);
    }

    #[test]
    fn finishing_on_the_last_budgeted_step_is_not_max_steps() {
        let mut scheduler =
            Scheduler::new(vec![spec("a", &[]), spec("b", &[])], 1).expect("scheduler");
        let backend = ScriptedBackend::always(ResultStatus::Success);
        let summary =
            run(&mut scheduler, &backend, &context(), options(2, true), |_| {}).expect("run");
        assert_eq!(summary.stop_reason, StopReason::NoRunnableSpecs);
        assert_eq!(summary.counts.completed, 2);
    }

    #[test]
    fn failure_stop_exposes_triggering_error() {
        let mut scheduler = Scheduler::new(vec![spec("a", &[])], 3).expect("scheduler");
        let backend = ScriptedBackend::new(vec![SpecResult::failure("broke", "tests failed")]);
        let summary =
            run(&mut scheduler, &backend, &context(), options(5, true), |_| {}).expect("run");
        assert_eq!(summary.stop_reason, StopReason::Failure);
        assert_eq!(summary.failure_error.as_deref(), Some("tests failed"));
        assert_eq!(summary.steps, 1);
    }

    #[test]
    fn partial_counts_as_failure_for_stop_policy() {
        let mut scheduler =
            Scheduler::new(vec![spec("a", &[]), spec("b", &[])], 1).expect("scheduler");
        let backend = ScriptedBackend::new(vec![SpecResult::with_status(
            ResultStatus::Partial,
            "half",
        )]);
        let summary =
            run(&mut scheduler, &backend, &context(), options(5, true), |_| {}).expect("run");
        assert_eq!(summary.stop_reason, StopReason::Failure);
        assert_eq!(summary.failure_error, None);
        assert_eq!(scheduler.get("b").map(|s| s.status), Some(SpecStatus::Pending));
    }

    #[test]
    fn failed_dependency_leaves_dependents_blocked() {
        let mut scheduler = Scheduler::new(vec![spec("a", &[]), spec("b", &["a"])], 1)
            .expect("scheduler");
        let backend = ScriptedBackend::always(ResultStatus::Failure);
        let summary =
            run(&mut scheduler, &backend, &context(), options(5, false), |_| {}).expect("run");
        assert_eq!(summary.stop_reason, StopReason::NoRunnableSpecs);
        assert!(summary.is_blocked());
        assert_eq!(summary.blocked[0].id, "b");
        assert_eq!(summary.blocked[0].unmet_dependencies, vec!["a"]);
    }

    #[test]
    fn selector_controls_order_and_can_end_the_run() {
        let mut scheduler =
            Scheduler::new(vec![spec("a", &[]), spec("b", &[])], 1).expect("scheduler");
        let backend = ScriptedBackend::always(ResultStatus::Success);
        let summary = run_with_selector(
            &mut scheduler,
            &backend,
            &mut LastRunnable,
            &context(),
            options(5, true),
            |_| {},
        )
        .expect("run");
        assert_eq!(summary.executed_ids(), vec!["b", "a"]);

        let mut scheduler = Scheduler::new(vec![spec("a", &[])], 1).expect("scheduler");
        let summary = run_with_selector(
            &mut scheduler,
            &backend,
            &mut NeverSelect,
            &context(),
            options(5, true),
            |_| {},
        )
        .expect("run");
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.stop_reason, StopReason::NoRunnableSpecs);
    }

    #[test]
    fn backend_sees_step_index_and_on_step_sees_every_record() {
        let mut scheduler =
            Scheduler::new(vec![spec("a", &[]), spec("b", &["a"])], 1).expect("scheduler");
        let backend = ScriptedBackend::always(ResultStatus::Success);
        let mut seen = Vec::new();
        run(&mut scheduler, &backend, &context(), options(5, true), |record| {
            seen.push((record.index, record.spec_id.clone(), record.attempts));
        })
        .expect("run");
        assert_eq!(
            seen,
            vec![(0, "a".to_string(), 1), (1, "b".to_string(), 1)]
        );
        assert_eq!(backend.steps_seen(), vec![0, 1]);
    }
}
