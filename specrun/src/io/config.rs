//! Layered runner configuration.
//!
//! Resolution happens once at startup with a fixed precedence: CLI flag,
//! then environment variable, then `specrun.toml`, then built-in default.
//! The result is an immutable [`RunnerConfig`] handed to the core.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::BackendKind;
use crate::core::types::ResultStatus;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "specrun.toml";

/// Runner configuration (TOML).
///
/// Every key is optional; missing fields fall back to [`RunnerConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    pub backend: BackendKind,

    /// Step budget for one run.
    pub max_steps: u32,

    /// Attempts allowed per spec, counting the first.
    pub max_attempts: u32,

    /// Halt the run on the first non-success result.
    pub stop_on_failure: bool,

    /// Upper bound on one backend invocation, in seconds.
    pub timeout_secs: u64,

    /// Cap on captured stdout/stderr per backend subprocess.
    pub output_limit_bytes: usize,

    pub claude: ClaudeSettings,
    pub codex: CodexSettings,
    pub mock: MockSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Mock,
            max_steps: 1,
            max_attempts: 1,
            stop_on_failure: true,
            timeout_secs: 300,
            output_limit_bytes: 1_000_000,
            claude: ClaudeSettings::default(),
            codex: CodexSettings::default(),
            mock: MockSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClaudeSettings {
    pub executable: String,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub tools: Vec<String>,
    /// `0` leaves the CLI default in place.
    pub max_turns: u32,
    /// `0.0` leaves the CLI default in place.
    pub max_budget_usd: f64,
    pub no_session_persistence: bool,
}

impl Default for ClaudeSettings {
    fn default() -> Self {
        Self {
            executable: "claude".to_string(),
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            tools: Vec::new(),
            max_turns: 0,
            max_budget_usd: 0.0,
            no_session_persistence: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CodexSettings {
    pub executable: String,
    /// Empty means the CLI's own default model.
    pub model: String,
}

impl Default for CodexSettings {
    fn default() -> Self {
        Self {
            executable: "codex".to_string(),
            model: String::new(),
        }
    }
}

/// Fixed response returned by the mock backend for every spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MockSettings {
    pub status: ResultStatus,
    /// Defaults to `Mock execution of spec '<title>'`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub details: String,
    pub files_changed: Vec<String>,
    pub commands_run: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            status: ResultStatus::Success,
            summary: None,
            details: String::new(),
            files_changed: Vec::new(),
            commands_run: Vec::new(),
            error: None,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.claude.executable.trim().is_empty() {
            return Err(anyhow!("claude.executable must be non-empty"));
        }
        if self.codex.executable.trim().is_empty() {
            return Err(anyhow!("codex.executable must be non-empty"));
        }
        if self.mock.summary.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(anyhow!("mock.summary must be non-empty when set"));
        }
        if self.claude.max_budget_usd < 0.0 {
            return Err(anyhow!("claude.max_budget_usd must be >= 0"));
        }
        Ok(())
    }
}

/// Values supplied on the command line; `None` defers to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub backend: Option<BackendKind>,
    pub max_steps: Option<u32>,
    pub max_attempts: Option<u32>,
    pub stop_on_failure: Option<bool>,
    pub timeout_secs: Option<u64>,
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        return Ok(RunnerConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Apply environment and CLI layers on top of a file-level config.
///
/// `env` looks up one variable; pass `|key| std::env::var(key).ok()` in
/// production. Malformed numeric values are ignored with a warning.
pub fn resolve(
    mut cfg: RunnerConfig,
    mut env: impl FnMut(&str) -> Option<String>,
    overrides: &ConfigOverrides,
) -> Result<RunnerConfig> {
    let mut var = |key: &str| {
        env(key)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    if let Some(raw) = var("SPECRUN_BACKEND") {
        cfg.backend = raw
            .parse()
            .map_err(|err: String| anyhow!("SPECRUN_BACKEND: {err}"))?;
    }
    let timeout = parse_number(var("SPECRUN_TIMEOUT_SECS"), "SPECRUN_TIMEOUT_SECS")
        .or_else(|| parse_number(var("CLAUDE_CODE_TIMEOUT"), "CLAUDE_CODE_TIMEOUT"));
    if let Some(timeout) = timeout {
        cfg.timeout_secs = timeout;
    }

    if let Some(executable) = var("CLAUDE_CODE_EXECUTABLE") {
        cfg.claude.executable = executable;
    }
    if let Some(tools) = var("CLAUDE_CODE_ALLOWED_TOOLS") {
        cfg.claude.allowed_tools = split_list(&tools);
    }
    if let Some(tools) = var("CLAUDE_CODE_DISALLOWED_TOOLS") {
        cfg.claude.disallowed_tools = split_list(&tools);
    }
    if let Some(tools) = var("CLAUDE_CODE_TOOLS") {
        cfg.claude.tools = split_list(&tools);
    }
    if let Some(turns) = parse_number(var("CLAUDE_CODE_MAX_TURNS"), "CLAUDE_CODE_MAX_TURNS") {
        cfg.claude.max_turns = turns;
    }
    if let Some(budget) = parse_number(var("CLAUDE_CODE_MAX_BUDGET_USD"), "CLAUDE_CODE_MAX_BUDGET_USD") {
        cfg.claude.max_budget_usd = budget;
    }
    if let Some(raw) = var("CLAUDE_CODE_NO_SESSION_PERSISTENCE") {
        cfg.claude.no_session_persistence = parse_flag(&raw);
    }

    if let Some(executable) = var("CODEX_EXECUTABLE") {
        cfg.codex.executable = executable;
    }
    if let Some(model) = var("CODEX_MODEL") {
        cfg.codex.model = model;
    }

    if let Some(backend) = overrides.backend {
        cfg.backend = backend;
    }
    if let Some(max_steps) = overrides.max_steps {
        cfg.max_steps = max_steps;
    }
    if let Some(max_attempts) = overrides.max_attempts {
        cfg.max_attempts = max_attempts;
    }
    if let Some(stop) = overrides.stop_on_failure {
        cfg.stop_on_failure = stop;
    }
    if let Some(timeout) = overrides.timeout_secs {
        cfg.timeout_secs = timeout;
    }

    cfg.validate()?;
    debug!(backend = cfg.backend.as_str(), max_steps = cfg.max_steps, "resolved config");
    Ok(cfg)
}

fn parse_number<T: FromStr>(raw: Option<String>, key: &str) -> Option<T> {
    let raw = raw?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed numeric environment value");
            None
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
