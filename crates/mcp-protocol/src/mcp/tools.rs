use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::JsonSchema;

/// A tool descriptor as returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: JsonSchema,
}

/// One item of a tool result's `content` array. This server only ever
/// emits JSON-encoded text content (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolContent {
    pub fn json(value: &Value) -> Self {
        Self::Text {
            text: serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

/// The result of `tools/call`: a content array plus an `isError` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn ok(value: Value) -> Self {
        Self {
            content: vec![ToolContent::json(&value)],
            is_error: false,
        }
    }

    pub fn error(value: Value) -> Self {
        Self {
            content: vec![ToolContent::json(&value)],
            is_error: true,
        }
    }
}
