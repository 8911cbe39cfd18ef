//! Transport-agnostic JSON-RPC 2.0 dispatch: request/notification/batch
//! recognition, reserved-method rejection, and routing to registered method
//! handlers (spec.md §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use mcp_protocol::jsonrpc::{
    JsonRpcErrorObject, JsonRpcVersion, RequestId, RequestParams,
};

/// Context threaded through every handler call. The correlation id is
/// generated by the transport (or taken from the caller) before dispatch
/// and is never overwritten by a nested scope (spec.md §5).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub session_id: Option<String>,
}

/// A registered JSON-RPC method handler. Handlers return domain results as
/// `serde_json::Value` directly, or a `JsonRpcErrorObject` for protocol-level
/// failure — tool-level errors (`VALIDATION_ERROR` etc.) are encoded inside
/// a successful result per spec.md §7, not as a `JsonRpcErrorObject`.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(
        &self,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, JsonRpcErrorObject>;
}

#[async_trait]
impl<F, Fut> MethodHandler for F
where
    F: Fn(Option<RequestParams>, RequestContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, JsonRpcErrorObject>> + Send,
{
    async fn handle(
        &self,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, JsonRpcErrorObject> {
        (self)(params, ctx.clone()).await
    }
}

/// Registry + router. One instance is built at startup by the Mode
/// Selector and shared (behind `Arc`) across both transports.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, method: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        self.handlers.insert(method.into(), handler);
    }

    /// Dispatch one already-validated request, routing by method name.
    /// Reserved `rpc.*` methods and unregistered methods both yield
    /// `-32601`; handler failures are reported as-is (they already carry a
    /// stable JSON-RPC error code).
    async fn dispatch_request(
        &self,
        id: RequestId,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Value {
        if method.starts_with("rpc.") {
            return error_value(id, JsonRpcErrorObject::method_not_found(method, true));
        }
        let Some(handler) = self.handlers.get(method) else {
            return error_value(id, JsonRpcErrorObject::method_not_found(method, false));
        };
        match handler.handle(params, ctx).await {
            Ok(result) => success_value(id, result),
            Err(err) => error_value(id, err),
        }
    }

    /// Dispatch one already-validated notification (no response produced,
    /// but still routed so side effects — e.g. `notifications/initialized`
    /// — happen).
    async fn dispatch_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) {
        if method.starts_with("rpc.") {
            return;
        }
        if let Some(handler) = self.handlers.get(method) {
            let _ = handler.handle(params, ctx).await;
        }
    }

    /// Entry point: parse `raw` as a single message or a batch, dispatch
    /// each item, and return the same-shape response (single object, array,
    /// or `None` if the input was entirely notifications).
    ///
    /// `raw` is `Err` when the transport failed to even parse JSON — that
    /// maps directly to `-32700` with `id: null` (spec.md §4.1, §8 #3).
    pub async fn dispatch_raw(
        &self,
        raw: Result<Value, serde_json::Error>,
        ctx: &RequestContext,
    ) -> Option<Value> {
        let value = match raw {
            Ok(v) => v,
            Err(_) => {
                return Some(error_value(
                    RequestId::Null,
                    JsonRpcErrorObject::parse_error(),
                ));
            }
        };

        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Some(error_value(
                        RequestId::Null,
                        JsonRpcErrorObject::invalid_request("Batch array must not be empty"),
                    ));
                }
                let mut responses = Vec::new();
                for item in items {
                    if let Some(resp) = self.dispatch_one(item, ctx).await {
                        responses.push(resp);
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    Some(Value::Array(responses))
                }
            }
            single => self.dispatch_one(single, ctx).await,
        }
    }

    /// Dispatch a single (non-batch) JSON value: classify as request or
    /// notification, validating envelope shape first.
    async fn dispatch_one(&self, value: Value, ctx: &RequestContext) -> Option<Value> {
        let Value::Object(obj) = &value else {
            return Some(error_value(
                RequestId::Null,
                JsonRpcErrorObject::invalid_request("Request must be a JSON object"),
            ));
        };

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            _ => {
                return Some(error_value(
                    id_or_null(obj),
                    JsonRpcErrorObject::invalid_request("jsonrpc must be \"2.0\""),
                ));
            }
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return Some(error_value(
                id_or_null(obj),
                JsonRpcErrorObject::invalid_request("method is required"),
            ));
        };

        let params = obj
            .get("params")
            .cloned()
            .and_then(|p| serde_json::from_value::<RequestParams>(p).ok());

        match obj.get("id") {
            None => {
                self.dispatch_notification(method, params, ctx).await;
                None
            }
            Some(id_value) => match parse_request_id(id_value) {
                Some(id) => Some(self.dispatch_request(id, method, params, ctx).await),
                None => Some(error_value(
                    RequestId::Null,
                    JsonRpcErrorObject::invalid_request(
                        "id must be a string, number, or null",
                    ),
                )),
            },
        }
    }
}

fn id_or_null(obj: &serde_json::Map<String, Value>) -> RequestId {
    obj.get("id")
        .and_then(parse_request_id)
        .unwrap_or(RequestId::Null)
}

fn parse_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        Value::Null => Some(RequestId::Null),
        // Arrays, objects, and booleans are not valid ids.
        _ => None,
    }
}

fn success_value(id: RequestId, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

fn error_value(id: RequestId, error: JsonRpcErrorObject) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error,
    })
}

/// Re-exported so downstream crates don't need a direct `mcp-protocol`
/// dependency just for the version marker type.
pub const JSONRPC_VERSION_MARKER: JsonRpcVersion = JsonRpcVersion::V2_0;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext {
            correlation_id: "test".to_string(),
            session_id: None,
        }
    }

    #[tokio::test]
    async fn reserved_method_is_not_found_without_invoking_handler() {
        let mut dispatcher = Dispatcher::new();
        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let invoked2 = invoked.clone();
        dispatcher.register(
            "rpc.foo",
            Arc::new(move |_params, _ctx: RequestContext| {
                let invoked = invoked2.clone();
                async move {
                    invoked.store(true, std::sync::atomic::Ordering::SeqCst);
                    Ok(json!({}))
                }
            }),
        );

        let resp = dispatcher
            .dispatch_raw(
                Ok(json!({"jsonrpc":"2.0","id":7,"method":"rpc.foo"})),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(resp["error"]["code"], -32601);
        assert_eq!(resp["id"], 7);
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_batch_is_invalid_request() {
        let dispatcher = Dispatcher::new();
        let resp = dispatcher
            .dispatch_raw(Ok(json!([])), &ctx())
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], -32600);
        assert!(resp["id"].is_null());
    }

    #[tokio::test]
    async fn batch_elides_notifications() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            "tools/list",
            Arc::new(|_params, _ctx: RequestContext| async move { Ok(json!({"tools": []})) }),
        );

        let resp = dispatcher
            .dispatch_raw(
                Ok(json!([
                    {"jsonrpc":"2.0","id":1,"method":"tools/list"},
                    {"jsonrpc":"2.0","method":"tools/list"}
                ])),
                &ctx(),
            )
            .await
            .unwrap();

        let arr = resp.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["id"], 1);
    }

    #[tokio::test]
    async fn parse_error_has_null_id() {
        let dispatcher = Dispatcher::new();
        let bad: Result<Value, serde_json::Error> = serde_json::from_str("{not json");
        let resp = dispatcher.dispatch_raw(bad, &ctx()).await.unwrap();
        assert_eq!(resp["error"]["code"], -32700);
        assert!(resp["id"].is_null());
    }

    #[tokio::test]
    async fn boolean_id_is_invalid_request() {
        let dispatcher = Dispatcher::new();
        let resp = dispatcher
            .dispatch_raw(
                Ok(json!({"jsonrpc":"2.0","id":true,"method":"tools/list"})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], -32600);
        assert!(resp["id"].is_null());
    }
}
