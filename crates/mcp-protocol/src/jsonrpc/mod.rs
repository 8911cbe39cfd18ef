//! JSON-RPC 2.0 envelope types, transport-agnostic.

mod error;
mod notification;
mod request;
mod response;
mod types;

pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use types::{JsonRpcVersion, RequestId};

/// The literal `"jsonrpc"` version string this implementation speaks.
pub const JSONRPC_VERSION: &str = "2.0";
