//! HTTP+SSE Transport (C12): `/mcp` request/response + server-push stream,
//! API-key gated, plus the unauthenticated `/mcp/health` liveness check
//! (spec.md §4.8).

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use bytes::Bytes;
use control_plane::ApiKeyGate;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use mcp_dispatch::RequestContext;
use mcp_protocol::jsonrpc::{JsonRpcError, JsonRpcErrorObject, RequestId};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HttpConfig;
use crate::ServerContext;

type ResponseBody = BoxBody<Bytes, Infallible>;
const SESSION_HEADER: &str = "Mcp-Session-Id";

fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into()).boxed()
}

/// Per-session cancellation signals plus the live SSE connection count, both
/// scoped to one HTTP transport instance (spec.md §4.8).
#[derive(Default)]
struct HttpState {
    connections: AtomicUsize,
    sessions: Mutex<HashMap<String, Arc<Notify>>>,
}

impl HttpState {
    fn open_session(&self) -> (String, Arc<Notify>) {
        let id = Uuid::new_v4().to_string();
        let notify = Arc::new(Notify::new());
        self.sessions.lock().unwrap().insert(id.clone(), notify.clone());
        (id, notify)
    }

    /// `DELETE /mcp`: wake the session's SSE stream (if any is attached) so
    /// it closes promptly, and drop its registry entry. `true` if a session
    /// with this id was actually open.
    fn close_session(&self, id: &str) -> bool {
        match self.sessions.lock().unwrap().remove(id) {
            Some(notify) => {
                notify.notify_waiters();
                true
            }
            None => false,
        }
    }

    fn forget_session(&self, id: &str) {
        self.sessions.lock().unwrap().remove(id);
    }
}

/// Decrements the shared connection counter and drops the session's
/// registry entry when the SSE stream object is dropped — whether it ended
/// naturally (timeout, explicit DELETE) or the client disconnected.
struct SseGuard {
    state: Arc<HttpState>,
    session_id: String,
}

impl Drop for SseGuard {
    fn drop(&mut self) {
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
        self.state.forget_session(&self.session_id);
    }
}

/// Forwards polls to a boxed inner stream while holding an [`SseGuard`] for
/// the wrapper's lifetime. `Pin<Box<_>>` is always `Unpin`, so this struct
/// is `Unpin` too and needs no unsafe pin projection.
struct GuardedStream {
    inner: Pin<Box<dyn Stream<Item = Result<Frame<Bytes>, Infallible>> + Send>>,
    _guard: SseGuard,
}

impl Stream for GuardedStream {
    type Item = Result<Frame<Bytes>, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.as_mut().poll_next(cx)
    }
}

/// Bind and serve `/mcp` + `/mcp/health` until the process is terminated.
/// Refuses to start if the auth gate has no usable configuration
/// (spec.md §4.8 rule 5).
pub async fn run(ctx: Arc<ServerContext>) -> std::io::Result<()> {
    if !ctx.config.http_auth_is_satisfiable() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "HTTP transport requires MCP_API_KEY or the auth-disabled development flag",
        ));
    }

    if ctx.config.http.cors_allowed_origins.is_empty() {
        warn!("CORS is wide open (wildcard origin) — no explicit allowed origins configured");
    }

    let gate = Arc::new(ApiKeyGate::new(ctx.config.http.api_keys.clone()));
    let state = Arc::new(HttpState::default());
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.http.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP+SSE transport listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "accepted connection");
        let ctx = ctx.clone();
        let gate = gate.clone();
        let state = state.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let ctx = ctx.clone();
                let gate = gate.clone();
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle(req, ctx, gate, state).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!(error = %err, "connection closed");
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    ctx: Arc<ServerContext>,
    gate: Arc<ApiKeyGate>,
    state: Arc<HttpState>,
) -> Response<ResponseBody> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let mut response = match (method.as_str(), path.as_str()) {
        ("GET", "/mcp/health") => health_response(),
        ("POST", "/mcp") => match authenticate(&req, &gate, &ctx.config.http) {
            Ok(()) => handle_post(req, &ctx).await,
            Err(response) => response,
        },
        ("GET", "/mcp") => match authenticate(&req, &gate, &ctx.config.http) {
            Ok(()) => handle_sse(&ctx, &state),
            Err(response) => response,
        },
        ("DELETE", "/mcp") => match authenticate(&req, &gate, &ctx.config.http) {
            Ok(()) => handle_delete(&req, &state),
            Err(response) => response,
        },
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(full_body("Not Found"))
            .unwrap(),
    };

    apply_security_headers(response.headers_mut());
    apply_cors_headers(response.headers_mut(), &ctx.config.http, &req_origin(&req));
    response
}

fn req_origin(req: &Request<Incoming>) -> Option<String> {
    req.headers().get("Origin").and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn health_response() -> Response<ResponseBody> {
    let body = serde_json::json!({ "status": "UP", "transport": "http" }).to_string();
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(full_body(body))
        .unwrap()
}

/// `X-API-Key` gate (spec.md §4.8 rules 1-4). `Ok(())` means the caller may
/// proceed; `Err` carries the fully-formed 401 response to return as-is.
fn authenticate(
    req: &Request<Incoming>,
    gate: &ApiKeyGate,
    config: &HttpConfig,
) -> Result<(), Response<ResponseBody>> {
    if config.auth_disabled {
        return Ok(());
    }

    let presented = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok());
    match presented {
        None => Err(unauthorized(JsonRpcErrorObject::missing_api_key())),
        Some(key) => {
            if gate.verify(key) {
                Ok(())
            } else {
                warn!(key_digest = %ApiKeyGate::digest(key), "rejected invalid API key");
                Err(unauthorized(JsonRpcErrorObject::invalid_api_key()))
            }
        }
    }
}

fn unauthorized(error: JsonRpcErrorObject) -> Response<ResponseBody> {
    let body = serde_json::to_string(&JsonRpcError::new(RequestId::Null, error)).unwrap_or_default();
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .header("WWW-Authenticate", "ApiKey")
        .body(full_body(body))
        .unwrap()
}

async fn handle_post(req: Request<Incoming>, ctx: &ServerContext) -> Response<ResponseBody> {
    let session_id = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            error!(error = %err, "failed to read request body");
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(full_body("could not read request body"))
                .unwrap();
        }
    };

    let parsed: Result<serde_json::Value, serde_json::Error> = serde_json::from_slice(&bytes);
    let request_ctx = RequestContext {
        correlation_id: control_plane::new_correlation_id(),
        session_id,
    };

    let response = ctx.dispatcher.dispatch_raw(parsed, &request_ctx).await;
    let body = match response {
        Some(value) => serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string()),
        None => String::new(),
    };
    let status = if body.is_empty() { StatusCode::ACCEPTED } else { StatusCode::OK };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full_body(body))
        .unwrap()
}

/// `DELETE /mcp`: closes the caller's session (spec.md §4.8) by waking its
/// attached SSE stream, identified by the `Mcp-Session-Id` header minted
/// when that stream was opened.
fn handle_delete(req: &Request<Incoming>, state: &HttpState) -> Response<ResponseBody> {
    let Some(session_id) = req.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(full_body(format!("{SESSION_HEADER} header is required")))
            .unwrap();
    };

    if state.close_session(session_id) {
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(full_body(Bytes::new()))
            .unwrap()
    } else {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(full_body("no such session"))
            .unwrap()
    }
}

/// `GET /mcp`: open an SSE stream of server-push events, fed by the
/// [`ChangeBus`](crate::notify::ChangeBus) plus a heartbeat ticker, bounded
/// by `maxConnections` concurrent streams and closed on either the
/// connection timeout or an explicit `DELETE /mcp` for this session
/// (spec.md §4.8).
fn handle_sse(ctx: &ServerContext, state: &Arc<HttpState>) -> Response<ResponseBody> {
    let max_connections = ctx.config.http.max_connections;
    let previous = state.connections.fetch_add(1, Ordering::SeqCst);
    if previous >= max_connections {
        state.connections.fetch_sub(1, Ordering::SeqCst);
        return Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(full_body("too many concurrent SSE connections"))
            .unwrap();
    }

    let (session_id, closed) = state.open_session();

    let notifications = BroadcastStream::new(ctx.notify.subscribe()).filter_map(|item| item.ok());

    let heartbeat_interval = Duration::from_secs(ctx.config.http.heartbeat_interval_seconds);
    let heartbeats = tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(heartbeat_interval))
        .map(|_| mcp_protocol::mcp::ServerNotification::Heartbeat);

    let timeout = Duration::from_secs(ctx.config.http.connection_timeout_minutes * 60);
    let cutoff = async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {},
            _ = closed.notified() => {},
        }
    };

    let events = tokio_stream::StreamExt::merge(notifications, heartbeats)
        .take_until(cutoff)
        .map(|notification| {
            let frame = format!(
                "event: {}\ndata: {}\n\n",
                notification.sse_event(),
                notification.to_jsonrpc()
            );
            Ok::<_, Infallible>(Frame::data(Bytes::from(frame)))
        });

    let guarded = GuardedStream {
        inner: Box::pin(events),
        _guard: SseGuard {
            state: state.clone(),
            session_id: session_id.clone(),
        },
    };

    let body = StreamBody::new(guarded).boxed();

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header(SESSION_HEADER, session_id)
        .body(body)
        .unwrap()
}

fn apply_security_headers(headers: &mut HeaderMap) {
    insert(headers, "X-Content-Type-Options", "nosniff");
    insert(headers, "X-Frame-Options", "DENY");
    insert(
        headers,
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains",
    );
    insert(headers, "Cache-Control", "no-store");
    insert(headers, "Pragma", "no-cache");
}

/// Wildcard with a startup warning, or an explicit origin list with
/// credentials (spec.md §4.8).
fn apply_cors_headers(headers: &mut HeaderMap, config: &HttpConfig, origin: &Option<String>) {
    if config.cors_allowed_origins.is_empty() {
        insert(headers, "Access-Control-Allow-Origin", "*");
    } else if let Some(origin) = origin {
        if config.cors_allowed_origins.iter().any(|allowed| allowed == origin) {
            insert(headers, "Access-Control-Allow-Origin", origin);
            insert(headers, "Access-Control-Allow-Credentials", "true");
        }
    }
    insert(headers, "Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS");
    insert(headers, "Access-Control-Allow-Headers", "Content-Type, X-API-Key, Mcp-Session-Id");
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        headers.insert(name, value);
    }
}
