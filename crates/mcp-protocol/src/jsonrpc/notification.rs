use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::request::RequestParams;
use super::types::JsonRpcVersion;

/// A JSON-RPC notification: a request with no `id`, which therefore never
/// produces a response (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }

    pub fn with_object_params(method: impl Into<String>, params: HashMap<String, Value>) -> Self {
        Self::new(method, Some(RequestParams::Object(params)))
    }
}
