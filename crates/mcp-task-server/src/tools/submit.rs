//! `mcp-tasks` and `mcp-tasks-from-file`: inline and file-backed bulk task
//! submission (spec.md §4.2, §4.5). Both end the same way — create a job,
//! submit it to the Worker Pool, return the job envelope — so they share
//! `submit_batch`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mcp_protocol::mcp::{JsonSchema, ServerNotification};
use serde_json::Value;
use task_batch::{BatchSubmission, JobRegistry, PoolError, WorkerPool, MAX_BATCH_SIZE};
use task_domain::NewTask;
use tracing::warn;

use crate::notify::ChangeBus;
use crate::tool::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::tools::wire::parse_new_task;

/// Resolve `.`/`..` components against an already-absolute path without
/// touching the filesystem (no symlink resolution, no existence check).
fn lexically_normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

async fn submit_batch(
    registry: &Arc<JobRegistry>,
    pool: &Arc<WorkerPool>,
    notify: &Arc<ChangeBus>,
    tasks: Vec<NewTask>,
) -> ToolOutcome {
    if tasks.is_empty() {
        return Err(ToolError::validation("task list must not be empty"));
    }
    if tasks.len() > MAX_BATCH_SIZE {
        return Err(ToolError::validation(format!(
            "task list must contain at most {MAX_BATCH_SIZE} items, got {}",
            tasks.len()
        )));
    }

    let job = registry
        .create_job(tasks.len() as i64)
        .await
        .map_err(|err| ToolError::internal(format!("could not create job: {err}")))?;

    let job_id = job.id.clone();
    let notify_for_progress = notify.clone();
    let job_id_for_progress = job_id.clone();
    let progress: Arc<dyn Fn(u8) + Send + Sync> = Arc::new(move |percent| {
        notify_for_progress.publish(ServerNotification::JobProgress {
            job_id: job_id_for_progress.clone(),
            percent,
        });
    });

    let submission = BatchSubmission {
        job_id: job_id.clone(),
        tasks,
        progress: Some(progress),
    };

    match pool.submit(submission) {
        Ok(()) => Ok(serde_json::json!({
            "jobId": job_id,
            "status": job.status.as_str(),
            "totalTasks": job.total_tasks,
        })),
        Err(PoolError::QueueFull) | Err(PoolError::Closed) => {
            registry
                .fail_rejected(&job_id)
                .await
                .map_err(|err| ToolError::internal(format!("could not fail rejected job: {err}")))?;
            Err(ToolError::internal("server busy, retry later"))
        }
    }
}

/// `mcp-tasks`: submit up to 5000 inline tasks.
pub struct TasksTool {
    registry: Arc<JobRegistry>,
    pool: Arc<WorkerPool>,
    notify: Arc<ChangeBus>,
}

impl TasksTool {
    pub fn new(registry: Arc<JobRegistry>, pool: Arc<WorkerPool>, notify: Arc<ChangeBus>) -> Self {
        Self {
            registry,
            pool,
            notify,
        }
    }
}

#[async_trait]
impl Tool for TasksTool {
    fn name(&self) -> &'static str {
        "mcp-tasks"
    }

    fn description(&self) -> &'static str {
        "Submit up to 5000 tasks for asynchronous creation. Returns a job id to poll with mcp-job-status."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "tasks".to_string(),
            JsonSchema::array(super::schema::new_task_schema(), "Tasks to create, 1-5000 items"),
        );
        JsonSchema::object(properties, &["tasks"])
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let items = args
            .get("tasks")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::validation("tasks must be an array"))?;

        let mut tasks = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let task = parse_new_task(item)
                .map_err(|msg| ToolError::validation(format!("tasks[{index}]: {msg}")))?;
            tasks.push(task);
        }

        submit_batch(&self.registry, &self.pool, &self.notify, tasks).await
    }
}

/// `mcp-tasks-from-file`: same contract as `mcp-tasks`, reading the task
/// array from a whitelisted `.json` file (spec.md §4.5).
pub struct TasksFromFileTool {
    registry: Arc<JobRegistry>,
    pool: Arc<WorkerPool>,
    notify: Arc<ChangeBus>,
    allowed_roots: Vec<PathBuf>,
}

impl TasksFromFileTool {
    /// `allowed_roots` are canonicalised once, at `ToolRegistry` construction
    /// time (spec.md §4.5) — the process working directory and the system
    /// temp directory.
    pub fn new(
        registry: Arc<JobRegistry>,
        pool: Arc<WorkerPool>,
        notify: Arc<ChangeBus>,
        allowed_roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            registry,
            pool,
            notify,
            allowed_roots,
        }
    }

    /// Extension check first, then the allowed-roots check against a purely
    /// lexical normalisation of the path (no filesystem access, so a
    /// traversal attempt is caught even when the target doesn't exist), and
    /// only then `canonicalize()` to resolve symlinks and confirm the file
    /// is actually readable (spec.md §4.5's boundary tests).
    fn validate_path(&self, raw: &str) -> Result<PathBuf, ToolError> {
        if raw.starts_with('~') {
            return Err(ToolError::validation("home-directory paths are not allowed"));
        }
        if !raw.to_ascii_lowercase().ends_with(".json") {
            return Err(ToolError::validation("Only .json files are allowed"));
        }

        let raw_path = Path::new(raw);
        let absolute = if raw_path.is_absolute() {
            raw_path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|err| ToolError::internal(format!("could not resolve working directory: {err}")))?
                .join(raw_path)
        };
        let normalized = lexically_normalize(&absolute);

        let is_within_allowed_roots = |path: &Path| self.allowed_roots.iter().any(|root| path.starts_with(root));
        if !is_within_allowed_roots(&normalized) {
            return Err(ToolError::validation("outside of allowed directories"));
        }

        let canonical = normalized
            .canonicalize()
            .map_err(|_| ToolError::validation("file does not exist or is not readable"))?;

        // A symlink inside an allowed root can still resolve outside of it.
        if !is_within_allowed_roots(&canonical) {
            return Err(ToolError::validation("outside of allowed directories"));
        }

        Ok(canonical)
    }
}

#[async_trait]
impl Tool for TasksFromFileTool {
    fn name(&self) -> &'static str {
        "mcp-tasks-from-file"
    }

    fn description(&self) -> &'static str {
        "Read a JSON array of tasks from a whitelisted .json file and submit them like mcp-tasks."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            JsonSchema::string_desc("Path to a .json file containing an array of tasks"),
        );
        JsonSchema::object(properties, &["path"])
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let raw_path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("path must be a string"))?;

        let path = self.validate_path(raw_path)?;

        let contents = tokio::fs::read_to_string(&path).await.map_err(|err| {
            warn!(error = %err, path = %path.display(), "failed to read task import file");
            ToolError::validation("could not read file")
        })?;

        let parsed: Value = serde_json::from_str(&contents)
            .map_err(|_| ToolError::validation("file does not contain valid JSON"))?;
        let items = parsed
            .as_array()
            .ok_or_else(|| ToolError::validation("file must contain a JSON array of tasks"))?;
        if items.is_empty() {
            return Err(ToolError::validation("task list must not be empty"));
        }
        if items.len() > MAX_BATCH_SIZE {
            return Err(ToolError::validation(format!(
                "task list must contain at most {MAX_BATCH_SIZE} items, got {}",
                items.len()
            )));
        }

        let mut tasks = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let task = parse_new_task(item)
                .map_err(|msg| ToolError::validation(format!("tasks[{index}]: {msg}")))?;
            tasks.push(task);
        }

        submit_batch(&self.registry, &self.pool, &self.notify, tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_batch::PoolConfig;
    use task_domain::sqlite::SqliteStore;
    use task_domain::TaskStore;

    async fn setup() -> (Arc<JobRegistry>, Arc<WorkerPool>, Arc<ChangeBus>) {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let job_store: Arc<dyn task_domain::JobStore> =
            Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let registry = Arc::new(JobRegistry::new(job_store));
        let notify = Arc::new(ChangeBus::new());
        let pool = Arc::new(WorkerPool::new(
            PoolConfig::default(),
            registry.clone(),
            store,
            Arc::new(|_job_id: &str, _succeeded: bool| {}),
        ));
        (registry, pool, notify)
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let (registry, pool, notify) = setup().await;
        let err = submit_batch(&registry, &pool, &notify, vec![]).await.unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[tokio::test]
    async fn from_file_rejects_traversal_outside_allowed_roots() {
        let (registry, pool, notify) = setup().await;
        let tool = TasksFromFileTool::new(
            registry,
            pool,
            notify,
            vec![std::env::current_dir().unwrap()],
        );
        // Does not exist on disk, so this only passes if the allowed-roots
        // check runs before any filesystem access.
        let err = tool.validate_path("../../../etc/nonexistent-traversal.json").unwrap_err();
        assert!(err.message.contains("outside of allowed directories"));
    }

    #[tokio::test]
    async fn from_file_rejects_non_json_extension() {
        let (registry, pool, notify) = setup().await;
        let tool = TasksFromFileTool::new(
            registry,
            pool,
            notify,
            vec![std::env::current_dir().unwrap()],
        );
        let err = tool.validate_path("/etc/passwd").unwrap_err();
        assert!(err.message.contains("Only .json files are allowed"));
    }

    #[tokio::test]
    async fn from_file_rejects_home_expansion() {
        let (registry, pool, notify) = setup().await;
        let tool = TasksFromFileTool::new(
            registry,
            pool,
            notify,
            vec![std::env::current_dir().unwrap()],
        );
        let err = tool.validate_path("~/secrets.json").unwrap_err();
        assert!(err.message.contains("home-directory"));
    }
}
