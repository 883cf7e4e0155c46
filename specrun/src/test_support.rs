//! Test-only helpers: spec builders, a scripted backend, and throwaway git repos.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};

use crate::backend::Backend;
use crate::core::types::{ResultStatus, RunContext, Spec, SpecResult, SpecStatus};

/// Create a pending spec titled `"<id> title"` with the given dependencies.
pub fn spec(id: &str, deps: &[&str]) -> Spec {
    Spec::new(id, format!("{id} title")).with_dependencies(deps.iter().copied())
}

/// Create a spec with explicit lifecycle state.
pub fn spec_in(id: &str, status: SpecStatus, attempts: u32) -> Spec {
    Spec {
        status,
        attempts,
        ..spec(id, &[])
    }
}

/// A run context rooted in the system temp directory.
pub fn context() -> RunContext {
    RunContext {
        repo_path: std::env::temp_dir(),
        spec_path: PathBuf::from("specs.yaml"),
        goal: "test goal".to_string(),
        backend_name: "scripted".to_string(),
        run_id: "run-test".to_string(),
        step: 0,
        max_steps: 10,
        timeout_secs: 10,
    }
}

/// Backend returning queued results in order, then a fixed fallback.
pub struct ScriptedBackend {
    queue: RefCell<VecDeque<SpecResult>>,
    fallback: SpecResult,
    executed: RefCell<Vec<String>>,
    steps: RefCell<Vec<u32>>,
}

impl ScriptedBackend {
    /// Queued results first; `Success` once the queue is empty.
    pub fn new(results: Vec<SpecResult>) -> Self {
        Self {
            queue: RefCell::new(results.into()),
            fallback: SpecResult::success("scripted success"),
            executed: RefCell::new(Vec::new()),
            steps: RefCell::new(Vec::new()),
        }
    }

    /// Every call returns `status` (with an error for non-success).
    pub fn always(status: ResultStatus) -> Self {
        let mut fallback = SpecResult::with_status(status, format!("scripted {}", status.as_str()));
        if status != ResultStatus::Success {
            fallback.error = Some(format!("scripted {}", status.as_str()));
        }
        Self {
            fallback,
            ..Self::new(Vec::new())
        }
    }

    /// Spec ids in the order they were executed.
    pub fn executed_ids(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// `RunContext::step` observed on each call.
    pub fn steps_seen(&self) -> Vec<u32> {
        self.steps.borrow().clone()
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn execute(&self, spec: &Spec, context: &RunContext) -> SpecResult {
        self.executed.borrow_mut().push(spec.id.clone());
        self.steps.borrow_mut().push(context.step);
        self.queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn chat(&self, prompt: &str, _cwd: Option<&Path>) -> Result<String> {
        Ok(format!("scripted: {prompt}"))
    }
}

/// A temporary git repository with a configured committer.
pub struct TestRepo {
    temp: tempfile::TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp repo dir")?;
        let repo = Self { temp };
        repo.git(&["init", "-q"])?;
        repo.git(&["config", "user.email", "test@example.com"])?;
        repo.git(&["config", "user.name", "Test"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Write `name` and commit it.
    pub fn commit_file(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.root().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        self.git(&["add", name])?;
        self.git(&["commit", "-q", "-m", &format!("add {name}")])?;
        Ok(())
    }

    pub fn last_commit_subject(&self) -> Result<String> {
        Ok(self.git(&["log", "-1", "--format=%s"])?.trim().to_string())
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Write an executable `/bin/sh` script standing in for an external CLI.
#[cfg(unix)]
pub fn fake_cli(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}
