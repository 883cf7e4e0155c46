//! Backend that shells out to the OpenAI Codex CLI.
//!
//! Codex may answer in prose, so a reply that is not a JSON object is taken
//! as a success whose summary is the reply text. A JSON object must be a
//! valid result payload; anything else is a failure.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{Backend, ProcessLimits, apply_delta, run_tool};
use crate::core::delta::compute_delta;
use crate::core::payload::validate_payload;
use crate::core::types::{ResultStatus, RunContext, Spec, SpecResult};
use crate::io::config::CodexSettings;
use crate::io::git::Git;
use crate::prompt::{PromptStyle, render_spec_prompt};

const TOOL: &str = "Codex";
const INSTALL_HINT: &str = "Install the OpenAI Codex CLI and ensure it is on PATH, \
     or set CODEX_EXECUTABLE to the full path.";

#[derive(Debug, Clone)]
pub struct CodexBackend {
    settings: CodexSettings,
    limits: ProcessLimits,
}

impl CodexBackend {
    pub fn new(settings: CodexSettings, limits: ProcessLimits) -> Self {
        Self { settings, limits }
    }

    fn execute_args(&self, prompt: &str) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "--full-auto".to_string(),
            "--json".to_string(),
        ];
        self.push_model(&mut args);
        args.push(prompt.to_string());
        args
    }

    fn chat_args(&self, prompt: &str) -> Vec<String> {
        let mut args = vec!["-q".to_string(), "--json".to_string()];
        self.push_model(&mut args);
        args.push(prompt.to_string());
        args
    }

    fn push_model(&self, args: &mut Vec<String>) {
        let model = self.settings.model.trim();
        if !model.is_empty() {
            args.push("--model".to_string());
            args.push(model.to_string());
        }
    }
}

impl Backend for CodexBackend {
    fn name(&self) -> &str {
        "codex"
    }

    #[instrument(skip_all, fields(spec_id = %spec.id, step = context.step))]
    fn execute(&self, spec: &Spec, context: &RunContext) -> SpecResult {
        let git = Git::new(&context.repo_path);
        let before = git.snapshot();

        let prompt = match render_spec_prompt(spec, context, PromptStyle::Freeform) {
            Ok(prompt) => prompt,
            Err(err) => return SpecResult::failure("Prompt rendering failed", format!("{err:#}")),
        };

        info!(executable = %self.settings.executable, "starting codex");
        let output = match run_tool(
            &self.settings.executable,
            &self.execute_args(&prompt),
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

        let (result, reported_files) = interpret_reply(&extract_result_text(&output.stdout));
        debug!(status = result.status.as_str(), reported_files, "parsed codex output");
        apply_delta(result, reported_files, compute_delta(&before, &after))
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
        Ok(extract_result_text(&output.stdout))
    }
}

fn parse_object(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(raw.trim())
        .ok()
        .filter(Value::is_object)
}

/// The `result` string of the CLI's JSON envelope, or the raw output.
fn extract_result_text(stdout: &str) -> String {
    parse_object(stdout)
        .and_then(|envelope| {
            envelope
                .get("result")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| stdout.to_string())
        .trim()
        .to_string()
}

/// Build a result from the reply text, and whether it listed changed files.
fn interpret_reply(text: &str) -> (SpecResult, bool) {
    if let Some(payload) = parse_object(text) {
        return match validate_payload(&payload, &ResultStatus::ALL) {
            Ok(payload) => {
                let reported_files = payload.files_changed.is_some();
                (payload.into_result(), reported_files)
            }
            Err(err) => (
                SpecResult::failure("Codex returned invalid structured output", err),
                false,
            ),
        };
    }
    let summary = if text.is_empty() {
        "Codex completed successfully."
    } else {
        text
    };
    (SpecResult::success(summary), false)
}
