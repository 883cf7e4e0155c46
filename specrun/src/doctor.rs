//! `specrun doctor`: environment checks before a run.

use std::path::Path;

use crate::backend::BackendKind;
use crate::exit_codes;
use crate::io::config::ConfigOverrides;
use crate::io::git::Git;
use crate::io::process::find_executable;
use crate::io::spec_file::load_spec_file;
use crate::run::load_runner_config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Run every check; none of them stops the others.
pub fn run_checks(
    repo_path: &Path,
    spec_path: Option<&Path>,
    config_path: Option<&Path>,
    backend: Option<BackendKind>,
    env: impl FnMut(&str) -> Option<String>,
) -> Vec<Check> {
    let mut checks = vec![check_git(repo_path)];

    checks.push(match spec_path {
        None => Check::pass("spec", "skipped (no --spec provided)"),
        Some(path) => match load_spec_file(path) {
            Ok(collection) => Check::pass(
                "spec",
                format!("{} ({} specs)", path.display(), collection.specs.len()),
            ),
            Err(err) => Check::fail("spec", one_line(&err.to_string())),
        },
    });

    let overrides = ConfigOverrides {
        backend,
        ..ConfigOverrides::default()
    };
    match load_runner_config(repo_path, config_path, env, &overrides) {
        Err(err) => checks.push(Check::fail("config", one_line(&format!("{err:#}")))),
        Ok(config) => {
            checks.push(Check::pass("config", "ok"));
            checks.push(match config.backend {
                BackendKind::Mock => Check::pass("backend", "mock backend available"),
                BackendKind::Codex => {
                    check_executable("Codex", &config.codex.executable, "CODEX_EXECUTABLE")
                }
                BackendKind::Claude => check_executable(
                    "Claude Code",
                    &config.claude.executable,
                    "CLAUDE_CODE_EXECUTABLE",
                ),
            });
        }
    }
    checks
}

fn check_git(repo_path: &Path) -> Check {
    match Git::new(repo_path).version() {
        Ok(version) => Check::pass("git", version),
        Err(err) => Check::fail("git", format!("git not available ({})", one_line(&format!("{err:#}")))),
    }
}

fn check_executable(tool: &str, executable: &str, env_key: &str) -> Check {
    match find_executable(executable) {
        Some(path) => Check::pass("backend", format!("found {}", path.display())),
        None => Check::fail(
            "backend",
            format!("{tool} CLI not found: '{executable}'. Install it or set {env_key}."),
        ),
    }
}

fn one_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_checks(checks: &[Check]) -> String {
    checks
        .iter()
        .map(|check| {
            let status = if check.ok { "OK" } else { "FAIL" };
            format!("{}: {status} - {}\n", check.name, check.detail)
        })
        .collect()
}

pub fn exit_code(checks: &[Check]) -> i32 {
    if checks.iter().all(|check| check.ok) {
        exit_codes::OK
    } else {
        exit_codes::INVALID
    }
}
