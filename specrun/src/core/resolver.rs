//! Deterministic dependency ordering for a spec collection.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::core::errors::SchedulerError;
use crate::core::types::Spec;

/// Order `specs` so every spec follows its dependencies.
///
/// Returns positions into `specs`. Among specs whose dependencies have all been
/// emitted, the one appearing earliest in the input goes first. Dependency ids
/// that do not name a spec in the collection are ignored here; the runnability
/// policy keeps such specs from ever running.
pub fn resolve_order(specs: &[Spec]) -> Result<Vec<usize>, SchedulerError> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(specs.len());
    for (idx, spec) in specs.iter().enumerate() {
        position.entry(spec.id.as_str()).or_insert(idx);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    let mut indegree: Vec<usize> = vec![0; specs.len()];
    for (idx, spec) in specs.iter().enumerate() {
        for dep in &spec.dependencies {
            if let Some(&dep_idx) = position.get(dep.as_str()) {
                dependents[dep_idx].push(idx);
                indegree[idx] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut ordered = Vec::with_capacity(specs.len());
    while let Some(Reverse(idx)) = ready.pop() {
        ordered.push(idx);
        for &child in &dependents[idx] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    if ordered.len() != specs.len() {
        let unresolved = indegree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(idx, _)| specs[idx].id.clone())
            .collect();
        return Err(SchedulerError::CircularDependency { unresolved });
    }

    Ok(ordered)
}
