//! Wire types for the Model Context Protocol (2025-06-18): JSON-RPC 2.0
//! envelopes plus the tool/resource/prompt/initialize shapes built on top of
//! them.

pub mod jsonrpc;
pub mod mcp;

pub use jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcVersion, RequestId, RequestParams, ResponseResult,
};
pub use mcp::{
    CallToolResult, ClientCapabilities, Implementation, JsonSchema, Prompt, PromptArgument,
    PromptMessage, Resource, ResourceContents, ServerCapabilities, Tool, ToolContent,
};

/// The MCP protocol version this server implements.
pub const MCP_VERSION: &str = "2025-06-18";
/// The server's own `name` as reported during `initialize`.
pub const SERVER_NAME: &str = "mcp-task-server";
/// The server's own `version` as reported during `initialize`.
pub const SERVER_VERSION: &str = "1.0.0";
