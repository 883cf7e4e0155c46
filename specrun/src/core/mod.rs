//! Deterministic, pure scheduling logic.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod delta;
pub mod errors;
pub mod payload;
pub mod policy;
pub mod resolver;
pub mod scheduler;
pub mod summary;
pub mod types;
