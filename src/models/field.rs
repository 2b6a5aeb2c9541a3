//! Classifier input and output shapes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declared type of a field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Timestamp,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Timestamp => "timestamp",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Datetime | FieldType::Timestamp)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "text" => Ok(FieldType::String),
            "integer" | "int" => Ok(FieldType::Integer),
            "float" | "double" | "decimal" | "number" => Ok(FieldType::Float),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::Datetime),
            "timestamp" => Ok(FieldType::Timestamp),
            "array" | "list" => Ok(FieldType::Array),
            "object" | "map" => Ok(FieldType::Object),
            _ => Err(format!(
                "Invalid field type: {}. Use: string, integer, float, boolean, date, datetime, timestamp, array, object",
                s
            )),
        }
    }
}

/// Where a field is going to be rendered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderContext {
    #[default]
    List,
    Detail,
    Form,
    Timeline,
}

impl RenderContext {
    pub const ALL: [RenderContext; 4] = [
        RenderContext::List,
        RenderContext::Detail,
        RenderContext::Form,
        RenderContext::Timeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderContext::List => "list",
            RenderContext::Detail => "detail",
            RenderContext::Form => "form",
            RenderContext::Timeline => "timeline",
        }
    }
}

impl std::fmt::Display for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenderContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(RenderContext::List),
            "detail" => Ok(RenderContext::Detail),
            "form" => Ok(RenderContext::Form),
            "timeline" => Ok(RenderContext::Timeline),
            _ => Err(format!(
                "Invalid context: {}. Use: list, detail, form, timeline",
                s
            )),
        }
    }
}

/// A field to classify
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub nullable: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            value: None,
            nullable: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// One rule's verdict about a field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SemanticMatch {
    pub semantic: String,
    /// 0-100
    pub confidence: u8,
    pub reason: String,
}

/// Presentation directive chosen for a field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderInstruction {
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
}

impl RenderInstruction {
    pub fn new(component: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            variant: Some(variant.into()),
            props: None,
        }
    }

    /// Attach props; anything but a JSON object leaves the props unset
    pub fn with_props(mut self, props: Value) -> Self {
        if let Value::Object(map) = props {
            self.props = Some(map);
        }
        self
    }

    /// Used when no semantic reaches the threshold
    pub fn fallback() -> Self {
        Self::new("text", "plain")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// Matches at or above the threshold, best first
    pub all_matches: Vec<SemanticMatch>,
    pub confidence: u8,
    pub reasoning: Vec<String>,
}

/// Full classifier verdict for one field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub field: String,
    pub data_type: FieldType,
    /// Every rule that fired, best first; ties keep rule order
    pub semantics: Vec<SemanticMatch>,
    pub best_match: Option<SemanticMatch>,
    pub context: RenderContext,
    pub render_instruction: RenderInstruction,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Name of the winning semantic, if any
    pub fn semantic(&self) -> Option<&str> {
        self.best_match.as_ref().map(|m| m.semantic.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_definition_from_json() {
        let field: FieldDefinition = serde_json::from_value(json!({
            "name": "user_email",
            "type": "string",
            "value": "a@b.com"
        }))
        .unwrap();
        assert_eq!(field.field_type, FieldType::String);
        assert!(!field.nullable);
        assert_eq!(field.value, Some(json!("a@b.com")));
    }

    #[test]
    fn test_field_type_aliases() {
        assert_eq!("decimal".parse::<FieldType>(), Ok(FieldType::Float));
        assert_eq!("Timestamp".parse::<FieldType>(), Ok(FieldType::Timestamp));
        assert!("uuid".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_analysis_result_uses_camel_case() {
        let result = AnalysisResult {
            field: "x".to_string(),
            data_type: FieldType::String,
            semantics: vec![],
            best_match: None,
            context: RenderContext::Form,
            render_instruction: RenderInstruction::fallback(),
            metadata: AnalysisMetadata {
                all_matches: vec![],
                confidence: 0,
                reasoning: vec![],
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["dataType"], "string");
        assert_eq!(value["bestMatch"], Value::Null);
        assert_eq!(value["renderInstruction"]["component"], "text");
        assert_eq!(value["metadata"]["allMatches"], json!([]));
    }
}
