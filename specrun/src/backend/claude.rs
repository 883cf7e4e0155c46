//! Backend that shells out to the Claude Code CLI with a JSON-Schema-constrained reply.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{Backend, ProcessLimits, apply_delta, run_tool};
use crate::core::delta::compute_delta;
use crate::core::payload::{unwrap_nested, validate_payload};
use crate::core::types::{ResultStatus, RunContext, Spec, SpecResult};
use crate::io::config::ClaudeSettings;
use crate::io::git::Git;
use crate::prompt::{PromptStyle, render_spec_prompt};

const OUTPUT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/claude_output.schema.json"
));

const TOOL: &str = "Claude Code";
const INSTALL_HINT: &str = "Install it (see https://docs.anthropic.com/en/docs/claude-code) \
     or set CLAUDE_CODE_EXECUTABLE to the correct path.";

/// The structured reply may not claim `error`; that status is reserved for the runner.
const ALLOWED_STATUSES: &[ResultStatus] = &[
    ResultStatus::Success,
    ResultStatus::Partial,
    ResultStatus::Failure,
];

#[derive(Debug, Clone)]
pub struct ClaudeBackend {
    settings: ClaudeSettings,
    limits: ProcessLimits,
}

impl ClaudeBackend {
    pub fn new(settings: ClaudeSettings, limits: ProcessLimits) -> Self {
        Self { settings, limits }
    }

    fn execute_args(&self, prompt: &str, schema: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--json-schema".to_string(),
            schema.to_string(),
            prompt.to_string(),
        ];
        self.push_tool_flags(&mut args);
        args
    }

    fn chat_args(&self, prompt: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
            prompt.to_string(),
        ];
        self.push_tool_flags(&mut args);
        args
    }

    fn push_tool_flags(&self, args: &mut Vec<String>) {
        let settings = &self.settings;
        for (flag, values) in [
            ("--allowedTools", &settings.allowed_tools),
            ("--disallowedTools", &settings.disallowed_tools),
            ("--tools", &settings.tools),
        ] {
            if !values.is_empty() {
                args.push(flag.to_string());
                args.push(values.join(","));
            }
        }
        if settings.max_turns > 0 {
            args.push("--max-turns".to_string());
            args.push(settings.max_turns.to_string());
        }
        if settings.max_budget_usd > 0.0 {
            args.push("--max-budget-usd".to_string());
            args.push(settings.max_budget_usd.to_string());
        }
        if settings.no_session_persistence {
            args.push("--no-session-persistence".to_string());
        }
    }
}

impl Backend for ClaudeBackend {
    fn name(&self) -> &str {
        "claude"
    }

    #[instrument(skip_all, fields(spec_id = %spec.id, step = context.step))]
    fn execute(&self, spec: &Spec, context: &RunContext) -> SpecResult {
        let git = Git::new(&context.repo_path);
        let before = git.snapshot();

        let prompt = match render_spec_prompt(spec, context, PromptStyle::Structured) {
            Ok(prompt) => prompt,
            Err(err) => return SpecResult::failure("Prompt rendering failed", format!("{err:#}")),
        };
        let schema = match compact_schema() {
            Ok(schema) => schema,
            Err(err) => return SpecResult::failure("Output schema is invalid", err),
        };

        info!(executable = %self.settings.executable, "starting claude");
        let output = match run_tool(
            &self.settings.executable,
            &self.execute_args(&prompt, &schema),
            Some(&context.repo_path),
            context.timeout(),
            self.limits.output_limit_bytes,
        ) {
            Ok(output) => output,
            Err(failure) => {
                return failure.into_result(TOOL, &self.settings.executable, INSTALL_HINT);
            }
        };
        let after = git.snapshot();

        match parse_output(&output.stdout) {
            Ok((result, reported_files)) => {
                debug!(status = result.status.as_str(), "parsed claude output");
                apply_delta(result, reported_files, compute_delta(&before, &after))
            }
            Err((summary, error)) => SpecResult::failure(summary, error),
        }
    }

    fn chat(&self, prompt: &str, cwd: Option<&Path>) -> Result<String> {
        let output = run_tool(
            &self.settings.executable,
            &self.chat_args(prompt),
            cwd,
            self.limits.timeout,
            self.limits.output_limit_bytes,
        )
        .map_err(|failure| failure.into_error(TOOL, &self.settings.executable, INSTALL_HINT))?;
        Ok(output.stdout.trim().to_string())
    }
}

fn compact_schema() -> Result<String, String> {
    serde_json::from_str::<Value>(OUTPUT_SCHEMA)
        .map(|schema| schema.to_string())
        .map_err(|err| err.to_string())
}

/// Parse the CLI's JSON envelope into a result.
///
/// Returns whether the payload reported `files_changed` itself, or a
/// `(summary, error)` pair describing why the output was rejected.
fn parse_output(stdout: &str) -> Result<(SpecResult, bool), (&'static str, String)> {
    let envelope: Value = serde_json::from_str(stdout.trim()).map_err(|err| {
        (
            "Claude Code returned invalid JSON",
            format!("Invalid JSON output: {err}"),
        )
    })?;
    if !envelope.is_object() {
        return Err((
            "Claude Code returned invalid JSON",
            "Expected JSON object output from Claude Code.".to_string(),
        ));
    }
    let structured = match envelope.get("structured_output") {
        Some(value @ Value::Object(_)) => value,
        _ => {
            return Err((
                "Claude Code returned missing structured output",
                "Expected JSON output with a 'structured_output' object.".to_string(),
            ));
        }
    };
    // The schema itself wraps fields in `structured_output`, so the envelope nests twice.
    let payload = unwrap_nested(structured, "structured_output");
    let payload = validate_payload(payload, ALLOWED_STATUSES).map_err(|err| {
        (
            "Claude Code returned invalid structured output",
            format!("structured_output.{err}"),
        )
    })?;
    let reported_files = payload.files_changed.is_some();
    Ok((payload.into_result(), reported_files))
}
