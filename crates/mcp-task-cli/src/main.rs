//! Binary entry point: builds the object graph from the environment and
//! runs whichever transport(s) `MCP_TRANSPORT` selects.

use mcp_task_server::config::ServerConfig;
use mcp_task_server::{mode, ServerContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();
    let ctx = ServerContext::build(config).await?;
    mode::run(ctx).await?;
    Ok(())
}
