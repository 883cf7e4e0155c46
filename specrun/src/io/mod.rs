//! Side-effecting adapters: files, git, child processes, configuration.

pub mod config;
pub mod git;
pub mod process;
pub mod project_state;
pub mod run_log;
pub mod spec_file;
