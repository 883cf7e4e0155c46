//! Validation of machine-generated backend payloads.
//!
//! Backends that receive JSON from an external tool run it through
//! [`validate_payload`] before building a [`SpecResult`]. A rejected payload
//! carries a human-readable message that the backend folds into a failure
//! result.

use serde_json::{Map, Value};

use crate::core::types::{ResultStatus, SpecResult};

/// A payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayload {
    pub status: ResultStatus,
    pub summary: String,
    pub details: String,
    pub commands_run: Vec<String>,
    /// `None` when the payload did not report changed files.
    pub files_changed: Option<Vec<String>>,
    pub notes: Vec<String>,
    pub error: Option<String>,
    pub raw: Value,
}

impl ValidatedPayload {
    /// Build a result; notes are appended to `details`.
    pub fn into_result(self) -> SpecResult {
        SpecResult {
            status: self.status,
            summary: self.summary,
            details: merge_notes(&self.details, &self.notes),
            files_changed: self.files_changed.map(dedup_paths).unwrap_or_default(),
            commands_run: self.commands_run,
            error: self.error,
            structured_output: Some(self.raw),
        }
    }
}

/// Strip one level of `{ key: { ... } }` nesting, if present.
pub fn unwrap_nested<'a>(value: &'a Value, key: &str) -> &'a Value {
    match value.get(key) {
        Some(inner @ Value::Object(_)) => inner,
        _ => value,
    }
}

/// Validate a payload object against the shared result contract.
///
/// `status` must be one of `allowed`; `summary` must be a non-blank string.
/// Optional fields default to empty values; when present they must have the
/// right shape.
pub fn validate_payload(value: &Value, allowed: &[ResultStatus]) -> Result<ValidatedPayload, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "payload must be a JSON object".to_string())?;

    let status = match object.get("status") {
        Some(Value::String(raw)) => ResultStatus::parse(raw)
            .filter(|status| allowed.contains(status))
            .ok_or_else(|| format!("status must be one of: {}", status_names(allowed)))?,
        Some(_) => return Err("status must be a string".to_string()),
        None => return Err("status is required".to_string()),
    };

    let summary = match object.get("summary") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(_) => return Err("summary must be a non-empty string".to_string()),
        None => return Err("summary is required".to_string()),
    };

    let details = match object.get("details") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("details must be a string".to_string()),
    };

    let commands_run = string_list(object, "commands_run")?.unwrap_or_default();
    let files_changed = string_list(object, "files_changed")?;
    let notes = string_list(object, "notes")?.unwrap_or_default();

    let error = match object.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err("error must be a string or null".to_string()),
    };

    Ok(ValidatedPayload {
        status,
        summary,
        details,
        commands_run,
        files_changed,
        notes,
        error,
        raw: value.clone(),
    })
}

fn string_list(object: &Map<String, Value>, key: &str) -> Result<Option<Vec<String>>, String> {
    let Some(value) = object.get(key) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| format!("{key} must be a list of strings"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("{key} must be a list of strings"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn status_names(allowed: &[ResultStatus]) -> String {
    allowed
        .iter()
        .map(|status| status.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append `notes` to `details` as a bulleted `Notes:` block.
pub fn merge_notes(details: &str, notes: &[String]) -> String {
    if notes.is_empty() {
        return details.to_string();
    }
    let block = notes
        .iter()
        .map(|note| format!("- {note}"))
        .collect::<Vec<_>>()
        .join("\n");
    if details.trim().is_empty() {
        format!("Notes:\n{block}")
    } else {
        format!("{}\n\nNotes:\n{block}", details.trim_end())
    }
}

/// Drop repeated paths, keeping first-seen order.
pub fn dedup_paths(paths: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STRICT: &[ResultStatus] = &[
        ResultStatus::Success,
        ResultStatus::Partial,
        ResultStatus::Failure,
    ];

    #[test]
    fn minimal_payload_defaults_optional_fields() {
        let payload =
            validate_payload(&json!({"status": "success", "summary": "ok"}), STRICT).expect("valid");
        assert_eq!(payload.status, ResultStatus::Success);
        assert_eq!(payload.details, "");
        assert!(payload.commands_run.is_empty());
        assert_eq!(payload.files_changed, None);
        assert_eq!(payload.error, None);
    }

    #[test]
    fn missing_status_or_summary_is_rejected() {
        assert_eq!(
            validate_payload(&json!({"summary": "ok"}), STRICT).unwrap_err(),
            "status is required"
        );
        assert_eq!(
            validate_payload(&json!({"status": "success"}), STRICT).unwrap_err(),
            "summary is required"
        );
        assert_eq!(
            validate_payload(&json!({"status": "success", "summary": "   "}), STRICT).unwrap_err(),
            "summary must be a non-empty string"
        );
    }

    #[test]
    fn unrecognized_status_lists_allowed_values() {
        let err = validate_payload(&json!({"status": "error", "summary": "x"}), STRICT).unwrap_err();
        assert_eq!(err, "status must be one of: success, partial, failure");
        assert!(
            validate_payload(&json!({"status": "error", "summary": "x"}), &ResultStatus::ALL)
                .is_ok()
        );
    }

    #[test]
    fn list_fields_must_hold_only_strings() {
        let err = validate_payload(
            &json!({"status": "success", "summary": "x", "commands_run": ["ls", 3]}),
            STRICT,
        )
        .unwrap_err();
        assert_eq!(err, "commands_run must be a list of strings");

        let err = validate_payload(
            &json!({"status": "success", "summary": "x", "notes": "not a list"}),
            STRICT,
        )
        .unwrap_err();
        assert_eq!(err, "notes must be a list of strings");
    }

    #[test]
    fn error_must_be_string_or_null() {
        let ok = validate_payload(
            &json!({"status": "failure", "summary": "x", "error": null}),
            STRICT,
        )
        .expect("null error");
        assert_eq!(ok.error, None);

        let err = validate_payload(
            &json!({"status": "failure", "summary": "x", "error": {"code": 1}}),
            STRICT,
        )
        .unwrap_err();
        assert_eq!(err, "error must be a string or null");
    }

    #[test]
    fn details_of_wrong_type_is_rejected() {
        let err = validate_payload(
            &json!({"status": "success", "summary": "x", "details": 42}),
            STRICT,
        )
        .unwrap_err();
        assert_eq!(err, "details must be a string");
    }

    #[test]
    fn unwrap_nested_strips_exactly_one_level() {
        let doubled = json!({"structured_output": {"structured_output": {"status": "success"}}});
        let once = unwrap_nested(&doubled, "structured_output");
        assert!(once.get("structured_output").is_some());
        let flat = json!({"status": "success"});
        assert_eq!(unwrap_nested(&flat, "structured_output"), &flat);
    }

    #[test]
    fn into_result_merges_notes_and_dedups_files() {
        let payload = validate_payload(
            &json!({
                "status": "partial",
                "summary": "half",
                "details": "did some\n",
                "files_changed": ["a.rs", "b.rs", "a.rs"],
                "notes": ["left TODO", "flaky test"],
            }),
            STRICT,
        )
        .expect("valid");
        let result = payload.into_result();
        assert_eq!(result.details, "did some\n\nNotes:\n- left TODO\n- flaky test");
        assert_eq!(result.files_changed, vec!["a.rs", "b.rs"]);
        assert!(result.structured_output.is_some());
    }

    #[test]
    fn merge_notes_without_details_starts_with_notes_header() {
        assert_eq!(merge_notes("  ", &["n".to_string()]), "Notes:\n- n");
        assert_eq!(merge_notes("keep", &[]), "keep");
    }
}
