//! `mcp-job-status`: poll a batch job's current state (spec.md §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcp_protocol::mcp::JsonSchema;
use serde_json::Value;
use task_domain::JobStore;

use crate::tool::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::tools::wire::job_to_json;

pub struct JobStatusTool {
    store: Arc<dyn JobStore>,
}

impl JobStatusTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for JobStatusTool {
    fn name(&self) -> &'static str {
        "mcp-job-status"
    }

    fn description(&self) -> &'static str {
        "Return the current status, progress, and timing of a batch job."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert("jobId".to_string(), JsonSchema::string_desc("The job id returned by mcp-tasks"));
        JsonSchema::object(properties, &["jobId"])
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let job_id = args
            .get("jobId")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("jobId must be a string"))?;

        let job = self
            .store
            .find_by_id(job_id)
            .await
            .map_err(|err| ToolError::internal(format!("could not load job: {err}")))?
            .ok_or_else(|| ToolError::not_found(format!("unknown jobId: {job_id}")))?;

        Ok(job_to_json(&job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_domain::sqlite::SqliteStore;

    fn ctx() -> ToolContext {
        ToolContext {
            correlation_id: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let store: Arc<dyn JobStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let tool = JobStatusTool::new(store);
        let err = tool
            .call(serde_json::json!({"jobId": "does-not-exist"}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::tool::ToolErrorCode::NotFound);
    }

    #[tokio::test]
    async fn known_job_reports_progress_fields() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let job = store.create("job-1", 10).await.unwrap();
        store.mark_running(&job.id).await.unwrap();
        store.update_processed(&job.id, 5).await.unwrap();
        store.mark_completed(&job.id, 500).await.unwrap();

        let tool = JobStatusTool::new(store);
        let result = tool
            .call(serde_json::json!({"jobId": "job-1"}), &ctx())
            .await
            .unwrap();
        assert_eq!(result["status"], "COMPLETED");
        assert_eq!(result["progressPercent"], 100);
    }
}
