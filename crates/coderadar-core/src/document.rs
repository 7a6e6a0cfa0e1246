use serde::{Deserialize, Serialize};

/// Enumeration of parsed code entities. Closed per the data model; unlike
/// `language` (an open set), a `Scanner` must map whatever it parses onto one
/// of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentType {
    Function,
    Class,
    Method,
    Interface,
    Type,
    Module,
    Doc,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Function => "function",
            ComponentType::Class => "class",
            ComponentType::Method => "method",
            ComponentType::Interface => "interface",
            ComponentType::Type => "type",
            ComponentType::Module => "module",
            ComponentType::Doc => "doc",
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The typed part of `metadata`, plus an open spill-over map for extension
/// fields callers may attach without a schema change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file: String,
    pub path: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// One extracted code component, produced by a `Scanner` and embedded by an
/// `Embedder`. The id must be stable across runs for an unchanged file so
/// incremental updates can locate prior vectors by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub language: String,
    pub metadata: DocumentMetadata,
    pub text: String,
}

impl Document {
    /// Build the stable id shape `<relpath>:<name>:<startLine>`.
    pub fn make_id(relpath: &str, name: &str, start_line: usize) -> String {
        format!("{relpath}:{name}:{start_line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_id_matches_shape() {
        assert_eq!(Document::make_id("src/a.ts", "greet", 1), "src/a.ts:greet:1");
    }

    #[test]
    fn component_type_round_trips_through_json() {
        let json = serde_json::to_string(&ComponentType::Method).unwrap();
        assert_eq!(json, "\"method\"");
        let back: ComponentType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ComponentType::Method);
    }
}
