//! Deterministic backend: returns the configured result without doing any work.

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use super::Backend;
use crate::core::payload::dedup_paths;
use crate::core::types::{RunContext, Spec, SpecResult};
use crate::io::config::MockSettings;

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    settings: MockSettings,
}

impl MockBackend {
    pub fn new(settings: MockSettings) -> Self {
        Self { settings }
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn execute(&self, spec: &Spec, context: &RunContext) -> SpecResult {
        debug!(spec_id = %spec.id, step = context.step, "mock execute");
        let summary = self
            .settings
            .summary
            .clone()
            .unwrap_or_else(|| format!("Mock execution of spec '{}'", spec.title));
        SpecResult {
            status: self.settings.status,
            summary,
            details: self.settings.details.clone(),
            files_changed: dedup_paths(self.settings.files_changed.clone()),
            commands_run: self.settings.commands_run.clone(),
            error: self.settings.error.clone(),
            structured_output: None,
        }
    }

    fn chat(&self, prompt: &str, _cwd: Option<&Path>) -> Result<String> {
        Ok(format!("[mock] {prompt}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResultStatus;
    use crate::test_support::{context, spec};

    #[test]
    fn default_mock_succeeds_with_title_summary() {
        let result = MockBackend::default().execute(&spec("a", &[]), &context());
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(result.summary, "Mock execution of spec 'a title'");
        assert_eq!(result.error, None);
    }

    #[test]
    fn configured_mock_returns_fixed_failure() {
        let backend = MockBackend::new(MockSettings {
            status: ResultStatus::Failure,
            summary: Some("nope".to_string()),
            error: Some("boom".to_string()),
            files_changed: vec!["x.rs".to_string(), "y.rs".to_string(), "x.rs".to_string()],
            ..MockSettings::default()
        });
        let result = backend.execute(&spec("a", &[]), &context());
        assert_eq!(result.status, ResultStatus::Failure);
        assert_eq!(result.summary, "nope");
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.files_changed, vec!["x.rs", "y.rs"]);
    }

    #[test]
    fn chat_echoes_prompt() {
        let reply = MockBackend::default().chat("hello", None).expect("chat");
        assert_eq!(reply, "[mock] hello");
    }
}
