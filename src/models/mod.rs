//! Data models for semantic-protocol
//!
//! These are the JSON wire shapes exchanged with every consumer of the engine:
//! manifests for the registry, field definitions and analysis results for the
//! classifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

mod field;

pub use field::{
    AnalysisMetadata, AnalysisResult, FieldDefinition, FieldType, RenderContext,
    RenderInstruction, SemanticMatch,
};

/// Relationship keys known to every manifest
pub const PARENT: &str = "parent";
pub const CHILDREN: &str = "children";
pub const DEPENDENCIES: &str = "dependencies";
pub const VALIDATORS: &str = "validators";

/// Criticality of an element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criticality::Low => write!(f, "low"),
            Criticality::Medium => write!(f, "medium"),
            Criticality::High => write!(f, "high"),
            Criticality::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Criticality::Low),
            "medium" => Ok(Criticality::Medium),
            "high" => Ok(Criticality::High),
            "critical" => Ok(Criticality::Critical),
            _ => Err(format!(
                "Invalid criticality: {}. Use: low, medium, high, critical",
                s
            )),
        }
    }
}

/// The element a manifest describes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Element {
    /// Element type (`action`, `input`, ...). Mandatory at registration.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criticality: Option<Criticality>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Links to other manifests, by id
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Relationships {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<String>,
    /// Any other relation (`next`, `previous`, ...): a single id or a list of ids
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Relationships {
    /// Target ids stored under `key`, in declaration order.
    ///
    /// Unknown keys and non-string entries yield nothing.
    pub fn targets(&self, key: &str) -> Vec<&str> {
        match key {
            PARENT => self.parent.as_deref().into_iter().collect(),
            CHILDREN => self.children.iter().map(String::as_str).collect(),
            DEPENDENCIES => self.dependencies.iter().map(String::as_str).collect(),
            VALIDATORS => self.validators.iter().map(String::as_str).collect(),
            other => match self.other.get(other) {
                Some(Value::String(id)) => vec![id.as_str()],
                Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            },
        }
    }

    /// All relation keys that carry at least one target: the fixed keys first,
    /// then the extra keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let fixed = [PARENT, CHILDREN, DEPENDENCIES, VALIDATORS];
        fixed
            .into_iter()
            .chain(self.other.keys().map(String::as_str))
            .filter(|key| !self.targets(key).is_empty())
            .collect()
    }
}

/// A single declarative validation rule carried by a manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationRule {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ValidationRule>,
    #[serde(rename = "async", default, skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
}

/// Versioning and tagging information
///
/// Unset fields are left out of the JSON document, so a partial section on a
/// child manifest never overwrites its base with defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManifestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestMetadata {
    /// Declared version, `1.0.0` when none was given
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }
}

const DEFAULT_VERSION: &str = "1.0.0";

/// A structured record describing one discoverable entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Unique key in the registry. Mandatory at registration.
    #[serde(default)]
    pub id: String,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Id of a registered manifest this one is composed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default)]
    pub element: Element,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationships>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ManifestMetadata>,
}

fn default_protocol() -> String {
    "semantic://manifest/v1".to_string()
}

impl Manifest {
    /// Create a manifest with only the mandatory fields set
    pub fn new(id: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol: default_protocol(),
            extends: None,
            element: Element {
                kind: element_type.into(),
                ..Element::default()
            },
            context: None,
            relationships: None,
            validation: None,
            metadata: None,
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.element.intent = Some(intent.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.element.label = Some(label.into());
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.element.criticality = Some(criticality);
        self
    }

    pub fn with_extends(mut self, base: impl Into<String>) -> Self {
        self.extends = Some(base.into());
        self
    }

    /// Set one context entry, creating the context map if needed
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata
            .get_or_insert_with(ManifestMetadata::default)
            .tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.relationships_mut().parent = Some(parent.into());
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships_mut()
            .children
            .extend(children.into_iter().map(Into::into));
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships_mut()
            .dependencies
            .extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_validators<I, S>(mut self, validators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships_mut()
            .validators
            .extend(validators.into_iter().map(Into::into));
        self
    }

    /// Set an extra relation key such as `next`
    pub fn with_relation(mut self, key: impl Into<String>, target: impl Into<Value>) -> Self {
        self.relationships_mut()
            .other
            .insert(key.into(), target.into());
        self
    }

    fn relationships_mut(&mut self) -> &mut Relationships {
        self.relationships.get_or_insert_with(Relationships::default)
    }

    /// Target ids under a relation key; empty when the manifest has no relationships
    pub fn relation_targets(&self, key: &str) -> Vec<&str> {
        self.relationships
            .as_ref()
            .map(|r| r.targets(key))
            .unwrap_or_default()
    }

    /// Tags from metadata, empty when there is no metadata
    pub fn tags(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|m| m.tags.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_wire_shape() {
        let manifest = Manifest::new("submit-btn", "action")
            .with_intent("submit")
            .with_context("flow", "checkout")
            .with_children(["confirm-dialog"])
            .with_tags(["primary"]);

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["element"]["type"], "action");
        assert_eq!(value["element"]["intent"], "submit");
        assert_eq!(value["context"]["flow"], "checkout");
        assert_eq!(value["relationships"]["children"], json!(["confirm-dialog"]));
        assert_eq!(value["metadata"]["tags"], json!(["primary"]));
        assert!(value.get("extends").is_none());
    }

    #[test]
    fn test_unset_metadata_fields_not_serialized() {
        let metadata = ManifestMetadata {
            author: Some("me".into()),
            ..ManifestMetadata::default()
        };
        assert_eq!(serde_json::to_value(&metadata).unwrap(), json!({"author": "me"}));
        assert_eq!(metadata.version(), "1.0.0");

        let spec = ValidationSpec {
            rules: Vec::new(),
            is_async: Some(true),
        };
        assert_eq!(serde_json::to_value(&spec).unwrap(), json!({"async": true}));
    }

    #[test]
    fn test_manifest_defaults_when_fields_missing() {
        let manifest: Manifest = serde_json::from_value(json!({})).unwrap();
        assert!(manifest.id.is_empty());
        assert!(manifest.element.kind.is_empty());
        assert_eq!(manifest.protocol, "semantic://manifest/v1");
    }

    #[test]
    fn test_extra_relation_keys() {
        let manifest: Manifest = serde_json::from_value(json!({
            "id": "step-1",
            "element": {"type": "step"},
            "relationships": {"next": "step-2", "alternatives": ["a", 3, "b"]}
        }))
        .unwrap();

        assert_eq!(manifest.relation_targets("next"), vec!["step-2"]);
        assert_eq!(manifest.relation_targets("alternatives"), vec!["a", "b"]);
        assert!(manifest.relation_targets("missing").is_empty());
        assert_eq!(
            manifest.relationships.as_ref().unwrap().keys(),
            vec!["alternatives", "next"]
        );
    }

    #[test]
    fn test_criticality_parse() {
        assert_eq!("HIGH".parse::<Criticality>(), Ok(Criticality::High));
        assert!("urgent".parse::<Criticality>().is_err());
    }
}
