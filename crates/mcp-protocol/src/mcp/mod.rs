//! MCP 2025-06-18 primitive types layered on top of the JSON-RPC envelope.

mod initialize;
mod notifications;
mod prompts;
mod resources;
mod schema;
mod tools;

pub use initialize::{ClientCapabilities, Implementation, InitializeResult, ServerCapabilities, PROTOCOL_VERSION};
pub use notifications::ServerNotification;
pub use prompts::{GetPromptResult, Prompt, PromptArgument, PromptMessage, PromptMessageContent, PromptRole};
pub use resources::{Resource, ResourceContents, ResourceTemplate};
pub use schema::JsonSchema;
pub use tools::{CallToolResult, Tool, ToolContent};
