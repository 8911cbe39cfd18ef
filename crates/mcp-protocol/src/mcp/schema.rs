//! Hand-written JSON Schema builder. Per DESIGN.md's resolution of the
//! "JSON Schema Generator" Open Question, schemas are hand-written once per
//! tool rather than reflected from a DTO at every call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
    },
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        items: Box<JsonSchema>,
    },
    Object {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        properties: HashMap<String, JsonSchema>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        required: Vec<String>,
        #[serde(rename = "additionalProperties")]
        additional_properties: bool,
    },
}

impl JsonSchema {
    pub fn string() -> Self {
        Self::String {
            description: None,
            enum_values: None,
        }
    }

    pub fn string_desc(description: impl Into<String>) -> Self {
        Self::String {
            description: Some(description.into()),
            enum_values: None,
        }
    }

    pub fn string_enum(values: &[&str], description: impl Into<String>) -> Self {
        Self::String {
            description: Some(description.into()),
            enum_values: Some(values.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::Integer {
            description: Some(description.into()),
            minimum: None,
            maximum: None,
        }
    }

    pub fn integer_range(description: impl Into<String>, minimum: i64, maximum: i64) -> Self {
        Self::Integer {
            description: Some(description.into()),
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::Boolean {
            description: Some(description.into()),
        }
    }

    pub fn array(items: JsonSchema, description: impl Into<String>) -> Self {
        Self::Array {
            description: Some(description.into()),
            items: Box::new(items),
        }
    }

    /// Build an object schema with `additionalProperties: false`, as every
    /// tool input schema in this server requires (spec.md §4.2).
    pub fn object(properties: HashMap<String, JsonSchema>, required: &[&str]) -> Self {
        Self::Object {
            description: None,
            properties,
            required: required.iter().map(|s| s.to_string()).collect(),
            additional_properties: false,
        }
    }
}
