//! Repository snapshots written after a run (`--state`).
//!
//! A snapshot records where the repository ended up (HEAD, tracked files,
//! working-tree status and diff stat) together with the results of the run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::types::SpecResult;
use crate::io::git::Git;
use crate::io::run_log::write_atomic;

/// Default file name when a snapshot is saved without an explicit path.
pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub repo_path: PathBuf,
    pub git_head_sha: String,
    pub tracked_files: Vec<String>,
    /// Porcelain status lines, or `clean`.
    pub status_summary: String,
    /// `git diff --stat` output, or `no diffs`.
    pub diff_summary: String,
    #[serde(default)]
    pub last_test_summary: Option<String>,
    /// Results in execution order.
    #[serde(default)]
    pub history: Vec<SpecResult>,
}

/// Snapshot the repository at `repo_path`. `history` starts empty.
#[instrument(skip_all, fields(repo = %repo_path.display()))]
pub fn build_project_state(repo_path: &Path) -> Result<ProjectState> {
    let repo_path = repo_path
        .canonicalize()
        .map_err(|_| anyhow!("Repository path not found: {}", repo_path.display()))?;
    let git = Git::new(&repo_path);
    let state = ProjectState {
        git_head_sha: git.head_sha().context("read HEAD")?,
        tracked_files: git.tracked_files().context("list tracked files")?,
        status_summary: summarize(&git.status_text().context("read status")?, "clean"),
        diff_summary: summarize(&git.diff_stat().context("read diff stat")?, "no diffs"),
        last_test_summary: None,
        history: Vec::new(),
        repo_path,
    };
    debug!(head = %state.git_head_sha, tracked = state.tracked_files.len(), "built project state");
    Ok(state)
}

fn summarize(raw: &str, empty: &str) -> String {
    let lines: Vec<&str> = raw.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

/// Write `state` as pretty JSON to `path`, or `state.json` in its repository.
pub fn save_project_state(state: &ProjectState, path: Option<&Path>) -> Result<PathBuf> {
    let target = path.map_or_else(|| state.repo_path.join(STATE_FILE_NAME), Path::to_path_buf);
    let mut buf = serde_json::to_string_pretty(state).context("serialize project state")?;
    buf.push('\n');
    write_atomic(&target, &buf)?;
    debug!(path = %target.display(), "saved project state");
    Ok(target)
}

pub fn load_project_state(path: &Path) -> Result<ProjectState> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read project state {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse project state {}", path.display()))
}
