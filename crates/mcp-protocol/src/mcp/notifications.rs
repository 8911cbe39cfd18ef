use serde::Serialize;
use serde_json::Value;

/// Server-to-client push events. These become either MCP notifications
/// (over STDIO or SSE, method names per spec.md §6) or raw SSE event types
/// (`job-progress`, `job-completed`, `job-failed`, `heartbeat`) depending on
/// the transport (spec.md §4.8).
#[derive(Debug, Clone)]
pub enum ServerNotification {
    ResourcesListChanged,
    JobProgress { job_id: String, percent: u8 },
    JobCompleted { job_id: String },
    JobFailed { job_id: String, message: String },
    Heartbeat,
}

impl ServerNotification {
    /// The JSON-RPC notification method name, used by both STDIO and the
    /// POST/GET JSON-RPC surface of the HTTP transport.
    pub fn method(&self) -> &'static str {
        match self {
            Self::ResourcesListChanged => "notifications/resources/listChanged",
            Self::JobProgress { .. } => "notifications/progress",
            Self::JobCompleted { .. } | Self::JobFailed { .. } => "notifications/progress",
            Self::Heartbeat => "notifications/heartbeat",
        }
    }

    /// The SSE `event:` tag used by the HTTP transport's GET stream.
    pub fn sse_event(&self) -> &'static str {
        match self {
            Self::ResourcesListChanged => "message",
            Self::JobProgress { .. } => "job-progress",
            Self::JobCompleted { .. } => "job-completed",
            Self::JobFailed { .. } => "job-failed",
            Self::Heartbeat => "heartbeat",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            Self::ResourcesListChanged => serde_json::json!({}),
            Self::JobProgress { job_id, percent } => {
                serde_json::json!({ "jobId": job_id, "progressPercent": percent })
            }
            Self::JobCompleted { job_id } => serde_json::json!({ "jobId": job_id, "status": "COMPLETED" }),
            Self::JobFailed { job_id, message } => {
                serde_json::json!({ "jobId": job_id, "status": "FAILED", "message": message })
            }
            Self::Heartbeat => serde_json::json!({}),
        }
    }
}

#[derive(Serialize)]
struct RpcNotificationWire<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
}

impl ServerNotification {
    /// Render this notification as a JSON-RPC notification object, used by
    /// both transports to keep wire shape identical regardless of carrier.
    pub fn to_jsonrpc(&self) -> Value {
        serde_json::to_value(RpcNotificationWire {
            jsonrpc: "2.0",
            method: self.method(),
            params: self.params(),
        })
        .unwrap_or_else(|_| serde_json::json!({}))
    }
}
