//! Git adapter: status snapshots for change tracking and opt-in auto-commit.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, info, instrument};

use crate::core::delta::{Snapshot, StatusEntry, changed_paths, parse_status_line};

/// Conventional Commit type with optional scope and breaking marker, e.g. `feat(cli)!`.
static COMMIT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+(\([A-Za-z0-9_./-]+\))?!?$").expect("valid regex"));

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// `git --version` output, e.g. `git version 2.43.0`.
    pub fn version(&self) -> Result<String> {
        let out = self.run_capture(&["--version"])?;
        Ok(out.trim().to_string())
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain"])?;
        Ok(out.lines().filter_map(parse_status_line).collect())
    }

    /// Full SHA of `HEAD`; fails before the first commit.
    pub fn head_sha(&self) -> Result<String> {
        Ok(self.run_capture(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Paths tracked by the index, sorted.
    pub fn tracked_files(&self) -> Result<Vec<String>> {
        let mut files: Vec<String> = self
            .run_capture(&["ls-files"])?
            .lines()
            .map(str::to_string)
            .collect();
        files.sort();
        Ok(files)
    }

    /// Raw `git status --porcelain` text.
    pub fn status_text(&self) -> Result<String> {
        self.run_capture(&["status", "--porcelain"])
    }

    /// Raw `git diff --stat` text for unstaged changes.
    pub fn diff_stat(&self) -> Result<String> {
        self.run_capture(&["diff", "--stat"])
    }

    /// Changed paths right now, or a printable reason the snapshot failed.
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn snapshot(&self) -> Snapshot {
        match self.run_capture(&["status", "--porcelain"]) {
            Ok(out) => Ok(changed_paths(&out)),
            Err(err) => {
                debug!(err = %err, "git status snapshot failed");
                Err(err.to_string())
            }
        }
    }

    /// True if the worktree has uncommitted changes to tracked files.
    pub fn has_tracked_changes(&self) -> Result<bool> {
        Ok(self
            .status_porcelain()?
            .iter()
            .any(|entry| entry.code != "??"))
    }

    pub fn is_work_tree(&self) -> bool {
        self.run_capture(&["rev-parse", "--is-inside-work-tree"])
            .is_ok_and(|out| out.trim() == "true")
    }

    /// Stage modifications and deletions of tracked files only.
    pub fn stage_tracked(&self) -> Result<()> {
        self.run_checked(&["add", "-u"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Stage tracked changes and commit them under a normalised message.
    ///
    /// Untracked files are never added. Returns `Ok(false)` when there was
    /// nothing to commit.
    #[instrument(skip_all, fields(prefix = prefix.unwrap_or("")))]
    pub fn auto_commit(&self, message: &str, prefix: Option<&str>) -> Result<bool> {
        if !self.is_work_tree() {
            return Err(anyhow!(
                "not inside a git repository; auto-commit requires a git repo"
            ));
        }
        let message = normalize_commit_message(message, prefix)?;
        if !self.has_tracked_changes()? {
            info!("working tree is clean, skipping auto-commit");
            return Ok(false);
        }
        self.stage_tracked()?;
        let committed = self.commit_staged(&message)?;
        if committed {
            info!(message = %message, "auto-committed");
        }
        Ok(committed)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Build a single-line commit message: the first non-blank line of `message`
/// (or `auto-commit`), prefixed as `prefix: ...` when a prefix is given.
pub fn normalize_commit_message(message: &str, prefix: Option<&str>) -> Result<String> {
    let first_line = message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("auto-commit");

    let Some(prefix) = prefix.map(|p| p.trim().trim_end_matches(':')) else {
        return Ok(first_line.to_string());
    };
    if prefix.is_empty() {
        return Ok(first_line.to_string());
    }
    if !COMMIT_PREFIX_RE.is_match(prefix) {
        return Err(anyhow!(
            "invalid commit prefix '{prefix}' (expected e.g. feat, fix(cli), chore!)"
        ));
    }
    Ok(format!("{prefix}: {first_line}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;
    use std::fs;

    #[test]
    fn normalizes_to_first_non_blank_line() {
        let msg = normalize_commit_message("\n  add parser \nmore detail", None).expect("msg");
        assert_eq!(msg, "add parser");
        assert_eq!(normalize_commit_message("   ", None).expect("msg"), "auto-commit");
    }

    #[test]
    fn applies_and_validates_prefix() {
        assert_eq!(
            normalize_commit_message("add parser", Some("feat:")).expect("msg"),
            "feat: add parser"
        );
        assert_eq!(
            normalize_commit_message("x", Some("fix(cli)!")).expect("msg"),
            "fix(cli)!: x"
        );
        assert!(normalize_commit_message("x", Some("Not A Prefix")).is_err());
    }

    #[test]
    fn snapshot_reports_untracked_and_modified_paths() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_file("tracked.txt", "one").expect("commit");
        fs::write(repo.root().join("tracked.txt"), "two").expect("modify");
        fs::write(repo.root().join("new.txt"), "new").expect("create");

        let paths = Git::new(repo.root()).snapshot().expect("snapshot");
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        assert_eq!(paths, vec!["new.txt", "tracked.txt"]);
    }

    #[test]
    fn snapshot_outside_repo_is_an_error_message() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Git::new(temp.path()).snapshot().unwrap_err();
        assert!(err.contains("git status"), "unexpected message: {err}");
    }

    #[test]
    fn auto_commit_stages_tracked_files_only() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_file("tracked.txt", "one").expect("commit");
        fs::write(repo.root().join("tracked.txt"), "two").expect("modify");
        fs::write(repo.root().join("untracked.txt"), "x").expect("create");

        let git = Git::new(repo.root());
        assert!(git.auto_commit("update tracked", Some("chore")).expect("commit"));

        let entries = git.status_porcelain().expect("status");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "??");
        assert_eq!(repo.last_commit_subject().expect("log"), "chore: update tracked");
    }

    #[test]
    fn auto_commit_skips_clean_tree() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_file("a.txt", "a").expect("commit");
        let git = Git::new(repo.root());
        assert!(!git.auto_commit("nothing", None).expect("auto commit"));
    }

    #[test]
    fn auto_commit_outside_repo_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(Git::new(temp.path()).auto_commit("x", None).is_err());
    }
}
