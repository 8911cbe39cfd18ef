//! Mode Selector (C13): starts whichever transport(s) `MCP_TRANSPORT`
//! selects, against one shared [`ServerContext`] (spec.md §4.8).

use std::sync::Arc;

use crate::config::TransportMode;
use crate::ServerContext;

/// Run the transport(s) selected by `ctx.config.transport` to completion.
/// `Both` runs STDIO and HTTP concurrently and returns when either exits.
pub async fn run(ctx: ServerContext) -> std::io::Result<()> {
    match ctx.config.transport {
        TransportMode::Stdio => crate::stdio::run(&ctx).await,
        TransportMode::Http => crate::http::run(Arc::new(ctx)).await,
        TransportMode::Both => {
            let ctx = Arc::new(ctx);
            let http_ctx = ctx.clone();
            tokio::select! {
                result = crate::stdio::run(&ctx) => result,
                result = crate::http::run(http_ctx) => result,
            }
        }
    }
}
