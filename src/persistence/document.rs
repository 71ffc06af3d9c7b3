/// Serde model of the persisted workflow document
///
/// The on-disk format is a pretty-printed JSON object. Field order matters for
/// readers that stream the document: `identifier` always comes first, followed by
/// `workflowVersion`. Empty collections and absent optional fields are omitted,
/// and unknown fields are ignored so newer documents still load.

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Top-level persisted workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWorkflow {
    pub identifier: String,
    /// Schema version, written as a string; missing means version 0
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "version_to_string",
        deserialize_with = "version_from_string"
    )]
    pub workflow_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Target platform of the workflow controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_information: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<PersistedNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<PersistedConnection>,
}

/// One node; configuration entries are `key:type:value` tuples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNode {
    pub identifier: String,
    pub name: String,
    /// Layout position as an `x:y` tuple
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub component: PersistedComponent,
    /// Default profile
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<String>,
    /// Additional named profiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<PersistedProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_configuration_identifier: Option<String>,
    /// Dynamic inputs as `name:type` tuples
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_input: Vec<String>,
    /// Dynamic outputs as `name:type` tuples
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_output: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_meta_data: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_meta_data: BTreeMap<String, Vec<String>>,
}

/// Component reference of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedComponent {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Named configuration profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedProfile {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedConnection {
    pub source: String,
    pub output: String,
    pub target: String,
    pub input: String,
}

impl PersistedWorkflow {
    /// Parse document text; malformed JSON and missing required fields are parse errors
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the pretty-printed document text
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Schema version, 0 when the document carries none
    pub fn version(&self) -> u32 {
        self.workflow_version
            .unwrap_or(crate::workflow::graph::INITIAL_WORKFLOW_VERSION)
    }
}

fn version_to_string<S: Serializer>(version: &Option<u32>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match version {
        Some(v) => serializer.serialize_str(&v.to_string()),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn version_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u32),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(v)) => Ok(Some(v)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid workflow version '{text}'"))),
    }
}

/// 1-based line of the first occurrence of `value` as a JSON string in `text`
///
/// Used to attach line numbers to errors found after deserialization.
pub fn line_of(text: &str, value: &str) -> usize {
    let needle = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""));
    text.find(&needle)
        .map(|offset| text[..offset].matches('\n').count() + 1)
        .unwrap_or(1)
}

/// Parse error located at the first occurrence of `value`
pub(crate) fn error_at(text: &str, value: &str, message: impl Into<String>) -> WorkflowError {
    WorkflowError::parse(line_of(text, value), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identifier_reports_line() {
        let text = "{\n  \"workflowVersion\": \"1\",\n  \"name\": \"no id\"\n}";
        let err = PersistedWorkflow::from_text(text).unwrap_err();
        assert!(err.line().is_some());
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn version_is_written_as_text_after_identifier() {
        let doc = PersistedWorkflow {
            identifier: "wf-1".into(),
            workflow_version: Some(1),
            ..Default::default()
        };
        let text = doc.to_text().unwrap();
        assert!(text.find("\"identifier\"").unwrap() < text.find("\"workflowVersion\": \"1\"").unwrap());
        assert!(!text.contains("nodes"));
        assert_eq!(PersistedWorkflow::from_text(&text).unwrap(), doc);
    }

    #[test]
    fn missing_version_means_initial() {
        let doc = PersistedWorkflow::from_text(r#"{"identifier": "old"}"#).unwrap();
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn line_of_finds_quoted_value() {
        let text = "{\n  \"a\": \"x\",\n  \"b\": \"node-7\"\n}";
        assert_eq!(line_of(text, "node-7"), 3);
        assert_eq!(line_of(text, "missing"), 1);
    }
}
