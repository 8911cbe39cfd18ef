//! The Tool Registry (C7) contract and the `invoke_tool()` middleware
//! chain that every transport calls through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use control_plane::audit::{AuditCategory, AuditEvent};
use control_plane::{AuditLog, RateLimiter};
use mcp_protocol::mcp::{CallToolResult, JsonSchema};
use serde_json::Value;
use tracing::debug;

/// Request-scoped context handed to every tool call.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub correlation_id: String,
}

/// The stable, client-facing error codes (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorCode {
    ValidationError,
    NotFound,
    InternalError,
    RateLimitExceeded,
}

impl ToolErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            ToolErrorCode::ValidationError => "VALIDATION_ERROR",
            ToolErrorCode::NotFound => "NOT_FOUND",
            ToolErrorCode::InternalError => "INTERNAL_ERROR",
            ToolErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
        }
    }
}

/// A tool-level failure. `message` must already be scrubbed of
/// infrastructure detail — it is what the client receives verbatim
/// (spec.md §4.2 step 7).
#[derive(Debug, Clone)]
pub struct ToolError {
    pub code: ToolErrorCode,
    pub message: String,
    pub retry_after_seconds: Option<u64>,
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: ToolErrorCode::ValidationError,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: ToolErrorCode::NotFound,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ToolErrorCode::InternalError,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn rate_limited(tool_name: &str, retry_after_seconds: u64) -> Self {
        Self {
            code: ToolErrorCode::RateLimitExceeded,
            message: format!(
                "Rate limit exceeded for tool: {tool_name}. Please retry in {retry_after_seconds} seconds."
            ),
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    fn to_value(&self) -> Value {
        let mut obj = serde_json::json!({
            "error": self.message,
            "code": self.code.as_str(),
        });
        if let Some(retry_after) = self.retry_after_seconds {
            obj["retryAfterSeconds"] = Value::from(retry_after);
        }
        obj
    }
}

pub type ToolOutcome = Result<Value, ToolError>;

/// One of the seven registered tools.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> JsonSchema;
    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolOutcome;
}

/// Built once at startup (spec.md §4.2).
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        self.order.push(name);
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Wire-format tool catalogue for `tools/list`, in registration order.
    pub fn list(&self) -> Vec<mcp_protocol::mcp::Tool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| mcp_protocol::mcp::Tool {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }
}

/// The fixed middleware chain every transport routes `tools/call` through:
/// correlation scope (already on `ctx`) → audit start/end → rate limit →
/// tool validation+handler (inside `Tool::call`) (spec.md §4.2).
pub async fn invoke_tool(
    registry: &ToolRegistry,
    rate_limiter: &RateLimiter,
    audit: &AuditLog,
    name: &str,
    args: Value,
    ctx: ToolContext,
) -> CallToolResult {
    let Some(tool) = registry.get(name) else {
        return CallToolResult::error(ToolError::not_found(format!("Unknown tool: {name}")).to_value());
    };

    audit.emit(AuditEvent {
        event_type: "TOOL_INVOCATION_START".to_string(),
        category: AuditCategory::ToolInvocation,
        description: format!("Invoking tool {name}"),
        timestamp: chrono::Utc::now(),
        correlation_id: ctx.correlation_id.clone(),
        tool_name: Some(name.to_string()),
        metadata: HashMap::new(),
        success: true,
        error_message: None,
    });

    let consumed = rate_limiter.consume(name).await;
    if !consumed.consumed {
        audit.emit(AuditEvent {
            event_type: "RATE_LIMIT_EXCEEDED".to_string(),
            category: AuditCategory::ToolInvocation,
            description: format!("Rate limit exceeded for tool {name}"),
            timestamp: chrono::Utc::now(),
            correlation_id: ctx.correlation_id.clone(),
            tool_name: Some(name.to_string()),
            metadata: HashMap::new(),
            success: false,
            error_message: Some("rate limited".to_string()),
        });
        let error = ToolError::rate_limited(name, consumed.retry_after_seconds());
        return CallToolResult::error(error.to_value());
    }

    let started = Instant::now();
    let result = tool.call(args, &ctx).await;
    let latency_ms = started.elapsed().as_millis();
    debug!(tool = name, latency_ms, "tool call finished");

    match result {
        Ok(value) => {
            audit.emit(AuditEvent {
                event_type: "TOOL_INVOCATION_SUCCESS".to_string(),
                category: AuditCategory::ToolInvocation,
                description: format!("Tool {name} succeeded"),
                timestamp: chrono::Utc::now(),
                correlation_id: ctx.correlation_id,
                tool_name: Some(name.to_string()),
                metadata: HashMap::new(),
                success: true,
                error_message: None,
            });
            CallToolResult::ok(value)
        }
        Err(err) => {
            audit.emit(AuditEvent {
                event_type: "TOOL_INVOCATION_FAILURE".to_string(),
                category: AuditCategory::ToolInvocation,
                description: format!("Tool {name} failed"),
                timestamp: chrono::Utc::now(),
                correlation_id: ctx.correlation_id,
                tool_name: Some(name.to_string()),
                metadata: HashMap::new(),
                success: false,
                error_message: Some(err.message.clone()),
            });
            CallToolResult::error(err.to_value())
        }
    }
}
