//! Dependency-ordered spec execution against pluggable coding backends.
//!
//! A spec collection is ordered by its dependency graph and executed one spec
//! per step until nothing is runnable, a step fails, or the step budget runs
//! out. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (ordering, runnability, state
//!   transitions, payload validation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (spec files, config, git, child
//!   processes, run records).
//! - **[`backend`]**: The execution contract and its mock, Codex, and Claude
//!   Code implementations.
//!
//! [`orchestrator`] drives the loop; [`run`], [`plan`], and [`doctor`]
//! implement the CLI commands on top of it.

pub mod backend;
pub mod core;
pub mod doctor;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod prompt;
pub mod report;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
