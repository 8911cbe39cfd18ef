//! STDIO Transport (C11): one trusted peer, line-delimited JSON on
//! standard input/output, no authentication (spec.md §4.8).

use mcp_dispatch::RequestContext;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::ServerContext;

/// Run the STDIO loop to completion. Blocks the calling task until stdin
/// closes (EOF) — the intended behaviour for "trusted local invocation"
/// (spec.md §4.8). Server-push notifications (`resources/listChanged`,
/// job progress/completion) are interleaved as extra output lines whenever
/// one arrives between requests.
pub async fn run(ctx: &ServerContext) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();
    let mut notifications = ctx.notify.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break; };
                if line.trim().is_empty() {
                    continue;
                }

                let correlation_id = control_plane::new_correlation_id();
                let request_ctx = RequestContext {
                    correlation_id,
                    session_id: None,
                };

                let parsed: Result<serde_json::Value, serde_json::Error> = serde_json::from_str(&line);
                let Some(response) = ctx.dispatcher.dispatch_raw(parsed, &request_ctx).await else {
                    continue;
                };

                let encoded = match serde_json::to_string(&response) {
                    Ok(encoded) => encoded,
                    Err(err) => {
                        warn!(error = %err, "failed to encode response, dropping");
                        continue;
                    }
                };

                stdout.write_all(encoded.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            notification = notifications.recv() => {
                let notification = match notification {
                    Ok(notification) => notification,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "stdio transport dropped lagged notifications");
                        continue;
                    }
                    Err(RecvError::Closed) => continue,
                };

                let encoded = serde_json::to_string(&notification.to_jsonrpc()).unwrap_or_default();
                stdout.write_all(encoded.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
    }

    debug!("stdin closed, stdio transport shutting down");
    Ok(())
}
