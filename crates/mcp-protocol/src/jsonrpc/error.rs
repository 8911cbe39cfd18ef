use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::types::RequestId;

/// JSON-RPC 2.0 error codes, plus the server-defined `-32001` used by the
/// HTTP transport's API-key gate (spec.md §4.1, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    AuthenticationFailure,
    ResourceNotFound,
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::AuthenticationFailure => -32001,
            Self::ResourceNotFound => -32002,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::AuthenticationFailure => "Authentication failure",
            Self::ResourceNotFound => "Resource not found",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// The `error` object of a JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, None)
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidRequest,
            Some(reason.into()),
            None,
        )
    }

    pub fn method_not_found(method: &str, reserved: bool) -> Self {
        let message = if reserved {
            format!("Method not found: {method} (reserved prefix)")
        } else {
            format!("Method not found: {method}")
        };
        Self::new(JsonRpcErrorCode::MethodNotFound, Some(message), None)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidParams, Some(message.into()), None)
    }

    pub fn internal_error() -> Self {
        // The client never learns more than this; full detail goes to the
        // audit log only (spec.md §7).
        Self::new(
            JsonRpcErrorCode::InternalError,
            Some("An internal error occurred".to_string()),
            None,
        )
    }

    pub fn missing_api_key() -> Self {
        Self::new(
            JsonRpcErrorCode::AuthenticationFailure,
            Some("Missing API key".to_string()),
            None,
        )
    }

    pub fn invalid_api_key() -> Self {
        Self::new(
            JsonRpcErrorCode::AuthenticationFailure,
            Some("Invalid API key".to_string()),
            None,
        )
    }

    /// Grounded on the teacher's own dedicated not-found code rather than
    /// conflating this with `InvalidParams`.
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::ResourceNotFound, Some(message.into()), None)
    }
}

/// A full JSON-RPC error response. `id` is `Option` only to allow `null`
/// identification failures; it is always *present* on the wire (see
/// `RequestId::Null` and spec.md §8 invariant #3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: super::JsonRpcVersion,
    pub id: RequestId,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: RequestId, error: JsonRpcErrorObject) -> Self {
        Self {
            version: super::JsonRpcVersion::V2_0,
            id,
            error,
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}
