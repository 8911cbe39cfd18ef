//! `mcp-task-server`: Tool Registry (C7), Resource Provider (C8), Prompt
//! Provider (C9), both transports (C11/C12), and the Mode Selector (C13).
//!
//! Everything downstream of the domain/control-plane/batch crates lives
//! here: the object graph is assembled once, in [`ServerContext::build`],
//! and handed to whichever transport(s) the Mode Selector starts.

pub mod config;
pub mod http;
pub mod mode;
pub mod notify;
pub mod prompts;
pub mod resources;
pub mod stdio;
pub mod tool;
pub mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use control_plane::{AuditLog, RateLimiter};
use mcp_dispatch::{Dispatcher, RequestContext};
use mcp_protocol::jsonrpc::{JsonRpcErrorObject, RequestParams};
use mcp_protocol::mcp::InitializeResult;
use serde_json::Value;
use task_batch::{JobRegistry, WorkerPool};
use task_domain::sqlite::SqliteStore;
use task_domain::{JobStore, StoreError, TaskStore};
use tracing::info;

use crate::config::ServerConfig;
use crate::notify::ChangeBus;
use crate::prompts::{get_prompt_audited, PromptProvider};
use crate::resources::{read_resource_audited, ResourceProvider};
use crate::tool::{invoke_tool, ToolContext, ToolRegistry};
use crate::tools::{
    HelpTool, JobStatusTool, SchemaTasksTool, TasksFromFileTool, TasksListTool, TasksSummaryTool, TasksTool,
};

/// The full object graph, built once at startup by the Mode Selector and
/// shared (behind `Arc`) across both transports.
pub struct ServerContext {
    pub config: ServerConfig,
    pub tool_registry: Arc<ToolRegistry>,
    pub resources: Arc<ResourceProvider>,
    pub prompts: Arc<PromptProvider>,
    pub dispatcher: Dispatcher,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit: Arc<AuditLog>,
    pub notify: Arc<ChangeBus>,
    pub job_registry: Arc<JobRegistry>,
    pub worker_pool: Arc<WorkerPool>,
}

impl ServerContext {
    /// Assemble every collaborator from `config`, open the store, run
    /// startup orphan recovery (spec.md §8 invariant #10), and register
    /// all seven tools plus the JSON-RPC method table. No new batch job is
    /// accepted before this returns.
    pub async fn build(config: ServerConfig) -> Result<Self, StoreError> {
        let db = SqliteStore::connect(&config.database.path).await?;
        let store: Arc<dyn TaskStore> = Arc::new(db.clone());
        let job_store: Arc<dyn JobStore> = Arc::new(db.clone());

        let job_registry = Arc::new(JobRegistry::new(job_store.clone()));
        let recovered = job_registry.recover_orphans().await?;
        if recovered > 0 {
            info!(recovered, "recovered orphaned batch jobs at startup");
        }

        let notify = Arc::new(ChangeBus::new());
        let notify_for_pool = notify.clone();
        let on_job_done: Arc<dyn Fn(&str, bool) + Send + Sync> = Arc::new(move |job_id, succeeded| {
            let notification = if succeeded {
                mcp_protocol::mcp::ServerNotification::JobCompleted {
                    job_id: job_id.to_string(),
                }
            } else {
                mcp_protocol::mcp::ServerNotification::JobFailed {
                    job_id: job_id.to_string(),
                    message: "batch job failed".to_string(),
                }
            };
            notify_for_pool.publish(notification);
            // A committed batch changed what task://all and db://stats
            // contain, so the resource list's content is stale for anyone
            // who cached it (spec.md §4.3 step 5).
            if succeeded {
                notify_for_pool.publish(mcp_protocol::mcp::ServerNotification::ResourcesListChanged);
            }
        });

        let worker_pool = Arc::new(WorkerPool::new(
            config.pool,
            job_registry.clone(),
            store.clone(),
            on_job_done,
        ));

        let allowed_roots = allowed_import_roots();

        let mut tool_registry = ToolRegistry::new();
        tool_registry.register(Arc::new(HelpTool));
        tool_registry.register(Arc::new(SchemaTasksTool));
        tool_registry.register(Arc::new(TasksSummaryTool::new(store.clone())));
        tool_registry.register(Arc::new(TasksListTool::new(store.clone())));
        tool_registry.register(Arc::new(TasksTool::new(
            job_registry.clone(),
            worker_pool.clone(),
            notify.clone(),
        )));
        tool_registry.register(Arc::new(TasksFromFileTool::new(
            job_registry.clone(),
            worker_pool.clone(),
            notify.clone(),
            allowed_roots,
        )));
        tool_registry.register(Arc::new(JobStatusTool::new(job_store)));
        let tool_registry = Arc::new(tool_registry);

        let resources = Arc::new(ResourceProvider::new(store.clone(), config.resources.max_tasks));
        let prompts = Arc::new(PromptProvider::new(store.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let audit = Arc::new(AuditLog::new(config.audit.clone()));

        let mut dispatcher = Dispatcher::new();
        register_methods(
            &mut dispatcher,
            tool_registry.clone(),
            resources.clone(),
            prompts.clone(),
            rate_limiter.clone(),
            audit.clone(),
        );

        Ok(Self {
            config,
            tool_registry,
            resources,
            prompts,
            dispatcher,
            rate_limiter,
            audit,
            notify,
            job_registry,
            worker_pool,
        })
    }
}

/// The two directories `mcp-tasks-from-file` is allowed to read from,
/// canonicalised once at startup (spec.md §4.5): the process working
/// directory and the system temp directory.
fn allowed_import_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(canonical) = cwd.canonicalize() {
            roots.push(canonical);
        }
    }
    let temp = std::env::temp_dir();
    if let Ok(canonical) = temp.canonicalize() {
        roots.push(canonical);
    }
    roots
}

/// Register every dispatcher method this server answers (spec.md §4.1).
fn register_methods(
    dispatcher: &mut Dispatcher,
    tool_registry: Arc<ToolRegistry>,
    resources: Arc<ResourceProvider>,
    prompts: Arc<PromptProvider>,
    rate_limiter: Arc<RateLimiter>,
    audit: Arc<AuditLog>,
) {
    dispatcher.register(
        "initialize",
        Arc::new(|_params: Option<RequestParams>, _ctx: RequestContext| async move {
            Ok(serde_json::to_value(InitializeResult::task_server()).unwrap_or(Value::Null))
        }),
    );

    dispatcher.register(
        "notifications/initialized",
        Arc::new(|_params: Option<RequestParams>, _ctx: RequestContext| async move { Ok(Value::Null) }),
    );

    {
        let tool_registry = tool_registry.clone();
        dispatcher.register(
            "tools/list",
            Arc::new(move |_params: Option<RequestParams>, _ctx: RequestContext| {
                let tool_registry = tool_registry.clone();
                async move { Ok(serde_json::json!({ "tools": tool_registry.list() })) }
            }),
        );
    }

    {
        let tool_registry = tool_registry.clone();
        let rate_limiter = rate_limiter.clone();
        let audit = audit.clone();
        dispatcher.register(
            "tools/call",
            Arc::new(move |params: Option<RequestParams>, ctx: RequestContext| {
                let tool_registry = tool_registry.clone();
                let rate_limiter = rate_limiter.clone();
                let audit = audit.clone();
                async move {
                    let params = params.ok_or_else(|| JsonRpcErrorObject::invalid_params("params is required"))?;
                    let name = params
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| JsonRpcErrorObject::invalid_params("name is required"))?
                        .to_string();
                    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                    let tool_ctx = ToolContext {
                        correlation_id: ctx.correlation_id.clone(),
                    };
                    let result = invoke_tool(&tool_registry, &rate_limiter, &audit, &name, arguments, tool_ctx).await;
                    Ok(serde_json::to_value(result).unwrap_or(Value::Null))
                }
            }),
        );
    }

    {
        let resources = resources.clone();
        dispatcher.register(
            "resources/list",
            Arc::new(move |_params: Option<RequestParams>, _ctx: RequestContext| {
                let resources = resources.clone();
                async move { Ok(serde_json::json!({ "resources": resources.list() })) }
            }),
        );
    }

    {
        let resources = resources.clone();
        dispatcher.register(
            "resources/templates/list",
            Arc::new(move |_params: Option<RequestParams>, _ctx: RequestContext| {
                let resources = resources.clone();
                async move { Ok(serde_json::json!({ "resourceTemplates": resources.templates() })) }
            }),
        );
    }

    {
        let resources = resources.clone();
        let audit = audit.clone();
        dispatcher.register(
            "resources/read",
            Arc::new(move |params: Option<RequestParams>, ctx: RequestContext| {
                let resources = resources.clone();
                let audit = audit.clone();
                async move {
                    let params = params.ok_or_else(|| JsonRpcErrorObject::invalid_params("params is required"))?;
                    let uri = params
                        .get("uri")
                        .and_then(Value::as_str)
                        .ok_or_else(|| JsonRpcErrorObject::invalid_params("uri is required"))?;
                    match read_resource_audited(&resources, &audit, uri, &ctx.correlation_id).await {
                        Ok(contents) => Ok(serde_json::json!({ "contents": [contents] })),
                        Err(crate::resources::ResourceError::NotFound(message)) => {
                            Err(JsonRpcErrorObject::resource_not_found(message))
                        }
                        Err(crate::resources::ResourceError::Internal(_)) => Err(JsonRpcErrorObject::internal_error()),
                    }
                }
            }),
        );
    }

    {
        let prompts = prompts.clone();
        dispatcher.register(
            "prompts/list",
            Arc::new(move |_params: Option<RequestParams>, _ctx: RequestContext| {
                let prompts = prompts.clone();
                async move { Ok(serde_json::json!({ "prompts": prompts.list() })) }
            }),
        );
    }

    {
        let prompts = prompts.clone();
        let audit = audit.clone();
        dispatcher.register(
            "prompts/get",
            Arc::new(move |params: Option<RequestParams>, ctx: RequestContext| {
                let prompts = prompts.clone();
                let audit = audit.clone();
                async move {
                    let params = params.ok_or_else(|| JsonRpcErrorObject::invalid_params("params is required"))?;
                    let name = params
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| JsonRpcErrorObject::invalid_params("name is required"))?
                        .to_string();
                    let arguments = params
                        .get("arguments")
                        .and_then(Value::as_object)
                        .map(|obj| {
                            obj.iter()
                                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                                .collect()
                        })
                        .unwrap_or_default();
                    match get_prompt_audited(&prompts, &audit, &name, &arguments, &ctx.correlation_id).await {
                        Ok(result) => Ok(serde_json::to_value(result).unwrap_or(Value::Null)),
                        Err(_) => Err(JsonRpcErrorObject::internal_error()),
                    }
                }
            }),
        );
    }
}
