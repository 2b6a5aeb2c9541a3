//! Manifest validation
//!
//! Three levels: the JSON schema for raw wire documents, structural checks
//! for decoded manifests (what `register` enforces), and lint-like warnings
//! that never block registration.

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::models::{Criticality, Manifest};

static MANIFEST_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    let schema = json!({
        "type": "object",
        "required": ["id", "element"],
        "properties": {
            "id": {"type": "string", "minLength": 1},
            "protocol": {"type": "string"},
            "extends": {"type": "string"},
            "element": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": {"type": "string", "minLength": 1},
                    "intent": {"type": "string"},
                    "label": {"type": "string"},
                    "criticality": {"enum": ["low", "medium", "high", "critical"]}
                }
            },
            "context": {"type": "object"},
            "relationships": {
                "type": "object",
                "properties": {
                    "parent": {"type": "string"},
                    "children": {"type": "array", "items": {"type": "string"}},
                    "dependencies": {"type": "array", "items": {"type": "string"}},
                    "validators": {"type": "array", "items": {"type": "string"}}
                }
            },
            "validation": {
                "type": "object",
                "properties": {
                    "rules": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["field", "type"],
                            "properties": {
                                "field": {"type": "string"},
                                "type": {"type": "string"},
                                "message": {"type": "string"}
                            }
                        }
                    },
                    "async": {"type": "boolean"}
                }
            },
            "metadata": {
                "type": "object",
                "properties": {
                    "version": {"type": "string"},
                    "author": {"type": "string"},
                    "created": {"type": "string"},
                    "modified": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}}
                }
            }
        }
    });
    JSONSchema::compile(&schema).expect("built-in manifest schema compiles")
});

/// A single validation problem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path or JSON pointer of the offending field
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating one manifest: `{valid, errors}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check the fields `register` requires
pub fn validate_manifest(manifest: &Manifest) -> ValidationReport {
    let mut errors = Vec::new();

    if manifest.id.trim().is_empty() {
        errors.push(ValidationIssue::new("id", "id is required"));
    } else if manifest.id.chars().any(char::is_whitespace) {
        errors.push(ValidationIssue::new(
            "id",
            format!("id '{}' must not contain whitespace", manifest.id),
        ));
    }

    if manifest.element.kind.trim().is_empty() {
        errors.push(ValidationIssue::new("element.type", "element.type is required"));
    }

    if let Some(validation) = &manifest.validation {
        for (i, rule) in validation.rules.iter().enumerate() {
            if rule.field.is_empty() {
                errors.push(ValidationIssue::new(
                    format!("validation.rules[{}].field", i),
                    "rule field is required",
                ));
            }
            if rule.kind.is_empty() {
                errors.push(ValidationIssue::new(
                    format!("validation.rules[{}].type", i),
                    "rule type is required",
                ));
            }
        }
    }

    ValidationReport::from_issues(errors)
}

/// Validate a raw JSON document against the manifest schema
pub fn validate_document(document: &Value) -> ValidationReport {
    let errors = match MANIFEST_SCHEMA.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                let field = if path.is_empty() { "/".to_string() } else { path };
                ValidationIssue::new(field, e.to_string())
            })
            .collect(),
    };
    ValidationReport::from_issues(errors)
}

/// Check for common manifest issues (lint-like checks)
pub fn lint_manifest(manifest: &Manifest) -> Vec<String> {
    let mut warnings = Vec::new();
    let id = manifest.id.as_str();

    if manifest.element.label.is_none() {
        warnings.push(format!("{}: element has no label", id));
    }

    if let Some(relationships) = &manifest.relationships {
        for key in relationships.keys() {
            let mut seen = HashSet::new();
            for target in relationships.targets(key) {
                if target == id {
                    warnings.push(format!("{}: references itself via '{}'", id, key));
                }
                if !seen.insert(target) {
                    warnings.push(format!("{}: duplicate '{}' target {}", id, key, target));
                }
            }
        }
    }

    let mut tags = HashSet::new();
    for tag in manifest.tags() {
        if !tags.insert(tag) {
            warnings.push(format!("{}: duplicate tag '{}'", id, tag));
        }
    }

    match &manifest.validation {
        Some(validation) if validation.rules.is_empty() => {
            warnings.push(format!("{}: validation block has no rules", id));
        }
        None if manifest.element.criticality == Some(Criticality::Critical) => {
            warnings.push(format!("{}: critical element has no validation rules", id));
        }
        _ => {}
    }

    warnings
}
