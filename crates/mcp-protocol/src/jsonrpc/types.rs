use serde::{Deserialize, Serialize};
use std::fmt;

/// The `"jsonrpc"` field. Only `"2.0"` is accepted; any other value makes a
/// request invalid per spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonRpcVersion {
    #[serde(rename = "2.0")]
    V2_0,
}

impl Default for JsonRpcVersion {
    fn default() -> Self {
        Self::V2_0
    }
}

/// A JSON-RPC request id: string, number, or null. A container (object or
/// array) or a boolean is not a valid id and must be rejected at the
/// dispatcher boundary before this type is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    Null,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Null => write!(f, "null"),
        }
    }
}
