//! Per-spec prompt rendering for subprocess backends.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::types::{RunContext, Spec};

const SPEC_TEMPLATE: &str = include_str!("prompts/spec.md");

/// Which backend the prompt is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Asks for output matching the JSON Schema passed on the command line.
    Structured,
    /// No schema instruction; the CLI may answer in prose.
    Freeform,
}

/// Render the stable prompt for `spec`. Acceptance criteria are copied verbatim.
pub fn render_spec_prompt(spec: &Spec, run: &RunContext, style: PromptStyle) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("spec", SPEC_TEMPLATE)
        .context("load spec prompt template")?;
    let template = env.get_template("spec")?;
    let rendered = template
        .render(context! {
            repo_root => run.repo_path.display().to_string(),
            goal => (!run.goal.trim().is_empty()).then(|| run.goal.trim()),
            spec => spec,
            schema_instruction => style == PromptStyle::Structured,
        })
        .with_context(|| format!("render prompt for spec {}", spec.id))?;
    Ok(rendered.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context as run_context;

    fn sample_spec() -> Spec {
        let mut spec = Spec::new("parser", "Add parser");
        spec.description = "Parse the config format.".to_string();
        spec.acceptance_criteria = vec![
            "cargo test passes".to_string(),
            "handles <empty> input & comments".to_string(),
        ];
        spec
    }

    #[test]
    fn structured_prompt_matches_expected_layout() {
        let mut run = run_context();
        run.goal = String::new();
        let prompt = render_spec_prompt(&sample_spec(), &run, PromptStyle::Structured)
            .expect("render");
        let expected = format!(
            "You are implementing a spec in a git repository.\n\
             Constraints:\n\
             - Repo root: {}\n\
             - Only modify files inside the repo.\n\
             - Do not introduce unrelated changes.\n\
             \n\
             Spec:\n\
             - ID: parser\n\
             - Title: Add parser\n\
             - Description: Parse the config format.\n\
             Acceptance Criteria (verbatim):\n\
             - cargo test passes\n\
             - handles <empty> input & comments\n\
             \n\
             Instructions:\n\
             - Implement the spec.\n\
             - If acceptance criteria mention tests or linting, run the relevant checks.\n\
             - Return JSON that conforms to the provided JSON Schema.",
            run.repo_path.display()
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn freeform_prompt_omits_schema_instruction() {
        let prompt = render_spec_prompt(&sample_spec(), &run_context(), PromptStyle::Freeform)
            .expect("render");
        assert!(!prompt.contains("JSON Schema"));
        assert!(prompt.ends_with("run the relevant checks."));
    }

    #[test]
    fn empty_criteria_and_goal_are_rendered_explicitly() {
        let mut run = run_context();
        run.goal = "Ship v1".to_string();
        let spec = Spec::new("a", "A");
        let prompt = render_spec_prompt(&spec, &run, PromptStyle::Structured).expect("render");
        assert!(prompt.contains("- Overall goal: Ship v1\n"));
        assert!(prompt.contains("Acceptance Criteria (verbatim):\n- (none)\n"));
        assert!(!prompt.contains("Description"));
    }
}
