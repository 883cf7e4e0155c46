//! `specrun plan`: validate a spec file and show the resolved execution order.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::resolver::resolve_order;
use crate::core::types::Spec;
use crate::io::spec_file::load_spec_file;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub goal: Option<String>,
    /// Specs in dependency order.
    pub specs: Vec<Spec>,
}

pub fn build_plan(spec_path: &Path) -> Result<Plan> {
    let collection = load_spec_file(spec_path)?;
    let order = resolve_order(&collection.specs).context("resolve spec order")?;
    let specs = order
        .into_iter()
        .map(|idx| collection.specs[idx].clone())
        .collect();
    Ok(Plan {
        goal: collection.goal,
        specs,
    })
}

pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    if let Some(goal) = &plan.goal {
        out.push_str(&format!("Goal: {goal}\n"));
    }
    out.push_str("Plan:\n");
    for (number, spec) in plan.specs.iter().enumerate() {
        let deps = if spec.dependencies.is_empty() {
            String::new()
        } else {
            format!(" (deps: {})", spec.dependencies.join(", "))
        };
        out.push_str(&format!("{}. {} - {}{deps}\n", number + 1, spec.id, spec.title));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn plan_lists_specs_in_dependency_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("specs.yml");
        fs::write(
            &path,
            "\
goal: Parser
specs:
  - id: parse
    title: Parse tokens
    acceptance_criteria: []
    dependencies: [lex, ast]
  - id: lex
    title: Lex input
    acceptance_criteria: []
  - id: ast
    title: Define AST
    acceptance_criteria: []
",
        )
        .expect("write");
        let plan = build_plan(&path).expect("plan");
        assert_eq!(
            render_plan(&plan),
            "\
Goal: Parser
Plan:
1. lex - Lex input
2. ast - Define AST
3. parse - Parse tokens (deps: lex, ast)
"
        );
    }

    #[test]
    fn invalid_files_fail_with_every_problem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("specs.yaml");
        fs::write(
            &path,
            "specs:\n  - id: a\n    title: A\n    acceptance_criteria: []\n    dependencies: [x, y]\n",
        )
        .expect("write");
        let err = build_plan(&path).expect_err("invalid");
        let message = err.to_string();
        assert!(message.contains("unknown id 'x'"), "{message}");
        assert!(message.contains("unknown id 'y'"), "{message}");
    }
}
