//! Markdown run report rendered from an execution summary.

use chrono::{SecondsFormat, Utc};

use crate::core::summary::{ExecutionSummary, StepRecord};
use crate::core::types::{ResultStatus, RunContext};

fn status_icon(status: ResultStatus) -> &'static str {
    match status {
        ResultStatus::Success => "pass",
        ResultStatus::Partial => "partial",
        ResultStatus::Failure => "FAIL",
        ResultStatus::Error => "ERROR",
    }
}

/// Render the report stamped with the current UTC time.
pub fn render_report(summary: &ExecutionSummary, context: &RunContext) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    render_report_at(summary, context, &timestamp)
}

/// Render the report with a caller-supplied timestamp.
pub fn render_report_at(summary: &ExecutionSummary, context: &RunContext, timestamp: &str) -> String {
    let mut lines: Vec<String> = vec![
        format!("# {}", context.goal),
        String::new(),
        "## Metadata".to_string(),
        String::new(),
        format!("- **Backend:** {}", context.backend_name),
        format!("- **Run ID:** {}", context.run_id),
        format!("- **Max steps:** {}", context.max_steps),
        format!("- **Timestamp:** {timestamp}"),
        String::new(),
        "## Results".to_string(),
        String::new(),
    ];

    if summary.history.is_empty() {
        lines.push("No steps executed.".to_string());
    } else {
        lines.push("| Step | Spec ID | Title | Status | Attempts |".to_string());
        lines.push("|------|---------|-------|--------|----------|".to_string());
        for step in &summary.history {
            lines.push(format!(
                "| {} | {} | {} | {} | {} |",
                step.index + 1,
                table_cell(&step.spec_id),
                table_cell(&step.title),
                status_icon(step.result.status),
                step.attempts
            ));
        }
        lines.push(String::new());
        lines.push("## Spec Details".to_string());
        for step in &summary.history {
            lines.push(String::new());
            push_step_details(&mut lines, step);
        }
    }
    lines.push(String::new());

    let counts = &summary.counts;
    lines.push("## Totals".to_string());
    lines.push(String::new());
    lines.push(format!(
        "Completed: {}, Failed: {}, Pending: {}, In Progress: {}, Skipped: {}",
        counts.completed, counts.failed, counts.pending, counts.in_progress, counts.skipped
    ));
    lines.push(String::new());
    lines.push(format!(
        "**Stopped reason:** {}",
        summary.stop_reason.as_str()
    ));
    if let Some(error) = &summary.failure_error {
        lines.push(String::new());
        lines.push(format!("**Failure error:** {error}"));
    }

    if !summary.blocked.is_empty() {
        lines.push(String::new());
        lines.push("## Blocked".to_string());
        lines.push(String::new());
        for blocked in &summary.blocked {
            lines.push(format!(
                "- `{}` {} (waiting on: {})",
                blocked.id,
                blocked.title,
                blocked.unmet_dependencies.join(", ")
            ));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

fn push_step_details(lines: &mut Vec<String>, step: &StepRecord) {
    let result = &step.result;
    lines.push(format!("### {}: {}", step.spec_id, step.title));
    lines.push(String::new());
    lines.push(format!("**Status:** {}", result.status.as_str()));
    lines.push(String::new());
    lines.push(format!("**Summary:** {}", result.summary));
    if let Some(error) = result.error.as_deref().filter(|e| !e.is_empty()) {
        lines.push(String::new());
        lines.push(format!("**Error:** {error}"));
    }
    if !result.files_changed.is_empty() {
        lines.push(String::new());
        lines.push("**Files changed:**".to_string());
        lines.extend(result.files_changed.iter().map(|file| format!("- `{file}`")));
    }
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
