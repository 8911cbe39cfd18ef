//! Cross-crate end-to-end scenarios, one per literal example in spec.md §8.
//!
//! Each test builds its own `ServerContext` over a fresh SQLite file under
//! the OS temp directory so tests never share state.

use std::collections::HashMap;
use std::sync::Arc;

use control_plane::{AuditConfig, BucketConfig, RateLimitConfig};
use mcp_dispatch::RequestContext;
use mcp_task_server::config::{DatabaseConfig, HttpConfig, ResourceConfig, ServerConfig, TransportMode};
use mcp_task_server::ServerContext;
use serde_json::{json, Value};
use task_batch::PoolConfig;

fn unique_db_path(test_name: &str) -> String {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "mcp-task-server-e2e-{test_name}-{}.sqlite3",
        std::process::id()
    ));
    path.to_string_lossy().into_owned()
}

async fn build_context(test_name: &str) -> ServerContext {
    let config = ServerConfig {
        transport: TransportMode::Stdio,
        http: HttpConfig::default(),
        rate_limit: RateLimitConfig::default(),
        pool: PoolConfig::default(),
        audit: AuditConfig::default(),
        resources: ResourceConfig::default(),
        database: DatabaseConfig {
            path: unique_db_path(test_name),
        },
    };
    ServerContext::build(config).await.expect("server context builds")
}

fn ctx() -> RequestContext {
    RequestContext {
        correlation_id: "e2e-test".to_string(),
        session_id: None,
    }
}

/// `tools/call` results carry their payload JSON-encoded inside
/// `content[0].text` (see `ToolContent::Text`), not as a flat object, so this
/// unwraps that envelope and hands back the decoded payload plus `isError`.
async fn call_tool(server: &ServerContext, name: &str, arguments: Value) -> Value {
    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments },
    });
    let response = server
        .dispatcher
        .dispatch_raw(Ok(request), &ctx())
        .await
        .expect("tools/call always yields a response");
    let result = &response["result"];
    let is_error = result["isError"].as_bool().unwrap_or(false);
    let text = result["content"][0]["text"]
        .as_str()
        .expect("tool result content[0] must be text");
    let content: Value = serde_json::from_str(text).expect("tool result text must be JSON");
    json!({ "isError": is_error, "content": content })
}

/// Scenario 1: a bucket of capacity 1 lets the first call through and
/// denies the second with the exact rate-limit envelope.
#[tokio::test]
async fn rate_limit_denies_second_call_in_window() {
    let config = ServerConfig {
        transport: TransportMode::Stdio,
        http: HttpConfig::default(),
        rate_limit: RateLimitConfig {
            default_bucket: BucketConfig::default(),
            overrides: HashMap::from([(
                "mcp-tasks-summary".to_string(),
                BucketConfig {
                    capacity: 1,
                    refill_tokens: 1,
                    refill_interval: std::time::Duration::from_secs(60),
                },
            )]),
        },
        pool: PoolConfig::default(),
        audit: AuditConfig::default(),
        resources: ResourceConfig::default(),
        database: DatabaseConfig {
            path: unique_db_path("rate-limit"),
        },
    };
    let server = ServerContext::build(config).await.unwrap();

    let first = call_tool(&server, "mcp-tasks-summary", json!({})).await;
    assert_eq!(first["isError"], Value::Bool(false));
    assert_eq!(first["content"]["totalCount"], 0);

    let second = call_tool(&server, "mcp-tasks-summary", json!({})).await;
    assert_eq!(second["isError"], Value::Bool(true));
    assert_eq!(second["content"]["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(
        second["content"]["error"],
        "Rate limit exceeded for tool: mcp-tasks-summary. Please retry in 60 seconds."
    );
    assert_eq!(second["content"]["retryAfterSeconds"], 60);
}

/// Scenario 2: `POST /mcp` with no `X-API-Key` is rejected before the
/// dispatcher ever sees the request.
#[tokio::test]
async fn missing_api_key_is_rejected_with_401() {
    let mut config = ServerConfig {
        transport: TransportMode::Http,
        http: HttpConfig {
            port: 0,
            api_keys: vec!["secret-key".to_string()],
            ..HttpConfig::default()
        },
        rate_limit: RateLimitConfig::default(),
        pool: PoolConfig::default(),
        audit: AuditConfig::default(),
        resources: ResourceConfig::default(),
        database: DatabaseConfig {
            path: unique_db_path("missing-api-key"),
        },
    };
    // Bind an ephemeral port ourselves so we know it before the server starts.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    config.http.port = port;

    let server = Arc::new(ServerContext::build(config).await.unwrap());
    let server_for_task = server.clone();
    tokio::spawn(async move {
        let _ = mcp_task_server::http::run(server_for_task).await;
    });
    // Give the listener a moment to bind.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{port}/mcp"))
        .json(&json!({"jsonrpc":"2.0","id":1,"method":"tools/list"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        response.headers().get("WWW-Authenticate").unwrap(),
        "ApiKey"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"jsonrpc":"2.0","error":{"code":-32001,"message":"Missing API key"},"id":null})
    );
}

/// Scenario 3: a JSON-RPC batch array elides the notification and returns
/// a one-element array for the sole request.
#[tokio::test]
async fn batch_request_elides_notifications() {
    let server = build_context("batch-request").await;
    let batch = json!([
        {"jsonrpc":"2.0","id":1,"method":"tools/list"},
        {"jsonrpc":"2.0","method":"tools/list"},
    ]);
    let response = server.dispatcher.dispatch_raw(Ok(batch), &ctx()).await.unwrap();
    let array = response.as_array().unwrap();
    assert_eq!(array.len(), 1);
    assert_eq!(array[0]["id"], 1);
}

/// Scenario 4: a reserved `rpc.*` method is rejected before any handler
/// could run.
#[tokio::test]
async fn reserved_method_is_rejected() {
    let server = build_context("reserved-method").await;
    let request = json!({"jsonrpc":"2.0","id":7,"method":"rpc.foo"});
    let response = server.dispatcher.dispatch_raw(Ok(request), &ctx()).await.unwrap();
    assert_eq!(
        response,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": { "code": -32601, "message": "Method not found: rpc.foo (reserved prefix)" },
        })
    );
}

/// Scenario 5: submitting 1000 tasks returns a pending job whose status
/// eventually reports completion with all 1000 tasks processed.
#[tokio::test]
async fn async_insert_then_status_reaches_completed() {
    let server = build_context("async-insert").await;

    let tasks: Vec<Value> = (0..1000)
        .map(|i| json!({ "title": format!("task {i}") }))
        .collect();
    let submission = call_tool(&server, "mcp-tasks", json!({ "tasks": tasks })).await;
    assert_eq!(submission["isError"], Value::Bool(false));
    let job_id = submission["content"]["jobId"].as_str().unwrap().to_string();
    assert_eq!(submission["content"]["status"], "PENDING");
    assert_eq!(submission["content"]["totalTasks"], 1000);

    let mut final_status = None;
    for _ in 0..200 {
        let status = call_tool(&server, "mcp-job-status", json!({ "jobId": job_id })).await;
        if status["content"]["status"] == "COMPLETED" {
            final_status = Some(status);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }

    let status = final_status.expect("job did not reach COMPLETED in time");
    assert_eq!(status["content"]["processedTasks"], 1000);
    assert_eq!(status["content"]["progressPercent"], 100);
    assert!(status["content"]["tasksPerSecond"].as_i64().unwrap_or(0) >= 1);

    let summary = call_tool(&server, "mcp-tasks-summary", json!({})).await;
    assert_eq!(summary["content"]["totalCount"], 1000);
}

/// Scenario 6: a job left `RUNNING` by a crashed prior run is failed
/// during startup recovery, before any new job is accepted.
#[tokio::test]
async fn orphaned_running_job_is_failed_on_startup() {
    use task_domain::sqlite::SqliteStore;
    use task_domain::JobStore;

    let path = unique_db_path("orphan-recovery");
    {
        let store = SqliteStore::connect(&path).await.unwrap();
        let job = store.create("orphan-job", 5).await.unwrap();
        store.mark_running(&job.id).await.unwrap();
    }

    let config = ServerConfig {
        transport: TransportMode::Stdio,
        http: HttpConfig::default(),
        rate_limit: RateLimitConfig::default(),
        pool: PoolConfig::default(),
        audit: AuditConfig::default(),
        resources: ResourceConfig::default(),
        database: DatabaseConfig { path },
    };
    let server = ServerContext::build(config).await.unwrap();

    let status = call_tool(&server, "mcp-job-status", json!({ "jobId": "orphan-job" })).await;
    assert_eq!(status["content"]["status"], "FAILED");
    assert_eq!(
        status["content"]["errorMessage"],
        "Server restarted during processing"
    );
}
