//! Loading and validating YAML spec files.
//!
//! A file is checked in three passes: JSON Schema for structure, a typed
//! parse, then cross-spec checks (unique ids, known dependencies). Every
//! problem found in a pass is reported together.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::types::Spec;

const SPEC_FILE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/spec_file.schema.json"
));

static VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(SPEC_FILE_SCHEMA).map_err(|err| err.to_string())?;
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| err.to_string())
});

/// Specs and the optional overall goal read from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCollection {
    pub goal: Option<String>,
    pub specs: Vec<Spec>,
}

#[derive(Debug, Error)]
pub enum SpecFileError {
    #[error("Spec file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid spec file: {}\n- {}", .path.display(), .errors.join("\n- "))]
    Invalid { path: PathBuf, errors: Vec<String> },
    #[error("read spec file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("compile spec file schema: {0}")]
    Schema(String),
}

impl SpecFileError {
    fn invalid(path: &Path, errors: Vec<String>) -> Self {
        SpecFileError::Invalid {
            path: path.to_path_buf(),
            errors,
        }
    }

    /// Individual problems when the file was rejected as invalid.
    pub fn errors(&self) -> &[String] {
        match self {
            SpecFileError::Invalid { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpecDocument {
    #[serde(default)]
    goal: Option<String>,
    specs: Vec<SpecEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpecEntry {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    acceptance_criteria: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Load and validate the spec file at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_spec_file(path: &Path) -> Result<SpecCollection, SpecFileError> {
    if !path.is_file() {
        return Err(SpecFileError::NotFound(path.to_path_buf()));
    }
    check_extension(path)?;
    let text = fs::read_to_string(path).map_err(|source| SpecFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let collection = parse_spec_file(&text, path)?;
    debug!(specs = collection.specs.len(), "loaded spec file");
    Ok(collection)
}

fn check_extension(path: &Path) -> Result<(), SpecFileError> {
    let suffix = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let message = match suffix.as_str() {
        "yaml" | "yml" => return Ok(()),
        "md" | "markdown" => {
            "Markdown specs are not supported yet. Use a .yaml or .yml file instead.".to_string()
        }
        "" => "Unsupported spec file extension ''. Use .yaml or .yml.".to_string(),
        other => format!("Unsupported spec file extension '.{other}'. Use .yaml or .yml."),
    };
    Err(SpecFileError::invalid(path, vec![message]))
}

/// Validate YAML `text`; `path` only labels errors.
pub fn parse_spec_file(text: &str, path: &Path) -> Result<SpecCollection, SpecFileError> {
    let empty = || {
        SpecFileError::invalid(
            path,
            vec!["File is empty. Expected a mapping with keys: goal (optional) and specs.".into()],
        )
    };
    let has_content = text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#') && line != "---"
    });
    if !has_content {
        return Err(empty());
    }
    let document: Value = serde_yaml::from_str(text)
        .map_err(|err| SpecFileError::invalid(path, vec![format!("YAML parse error: {err}")]))?;
    if document.is_null() {
        return Err(empty());
    }

    let validator = VALIDATOR
        .as_ref()
        .map_err(|err| SpecFileError::Schema(err.clone()))?;
    let schema_errors: Vec<String> = validator
        .iter_errors(&document)
        .map(|err| err.to_string())
        .collect();
    if !schema_errors.is_empty() {
        return Err(SpecFileError::invalid(path, schema_errors));
    }

    let parsed: SpecDocument = serde_json::from_value(document)
        .map_err(|err| SpecFileError::invalid(path, vec![err.to_string()]))?;
    let errors = semantic_errors(&parsed);
    if !errors.is_empty() {
        return Err(SpecFileError::invalid(path, errors));
    }
    Ok(into_collection(parsed))
}

fn semantic_errors(document: &SpecDocument) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(goal) = &document.goal
        && goal.trim().is_empty()
    {
        errors.push("goal must be a non-empty string".to_string());
    }

    let mut first_index: HashMap<&str, usize> = HashMap::new();
    for (index, entry) in document.specs.iter().enumerate() {
        let id = entry.id.trim();
        if id.is_empty() {
            errors.push(format!("specs[{index}].id must be a non-empty string"));
        } else if let Some(previous) = first_index.get(id) {
            errors.push(format!(
                "specs[{index}].id duplicates '{id}' from specs[{previous}].id"
            ));
        } else {
            first_index.insert(id, index);
        }
        if entry.title.trim().is_empty() {
            errors.push(format!("specs[{index}].title must be a non-empty string"));
        }
        for (position, criterion) in entry.acceptance_criteria.iter().enumerate() {
            if criterion.trim().is_empty() {
                errors.push(format!(
                    "specs[{index}].acceptance_criteria[{position}] must be a non-empty string"
                ));
            }
        }
    }

    for (index, entry) in document.specs.iter().enumerate() {
        let id = entry.id.trim();
        for dependency in &entry.dependencies {
            let dependency = dependency.trim();
            if dependency == id {
                errors.push(format!("specs[{index}].dependencies must not include itself"));
            } else if !first_index.contains_key(dependency) {
                errors.push(format!(
                    "specs[{index}].dependencies contains unknown id '{dependency}'"
                ));
            }
        }
    }
    errors
}

fn into_collection(document: SpecDocument) -> SpecCollection {
    let specs = document
        .specs
        .into_iter()
        .map(|entry| {
            let mut spec = Spec::new(entry.id.trim(), entry.title.trim())
                .with_dependencies(entry.dependencies.iter().map(|dep| dep.trim()));
            spec.description = entry.description.trim().to_string();
            spec.acceptance_criteria = entry
                .acceptance_criteria
                .iter()
                .map(|criterion| criterion.trim().to_string())
                .collect();
            spec
        })
        .collect();
    SpecCollection {
        goal: document.goal.map(|goal| goal.trim().to_string()),
        specs,
    }
}
