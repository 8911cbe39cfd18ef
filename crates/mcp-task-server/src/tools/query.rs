//! `mcp-tasks-summary` and `mcp-tasks-list`: read-only aggregate and paged
//! views over the task store (spec.md §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcp_protocol::mcp::JsonSchema;
use serde_json::Value;
use task_domain::{TaskStatus, TaskStore};
use tracing::warn;

use crate::tool::{Tool, ToolContext, ToolError, ToolOutcome};
use crate::tools::wire::task_to_json;

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

/// `mcp-tasks-summary`: aggregate counts by status + earliest/latest due
/// date + generation instant.
pub struct TasksSummaryTool {
    store: Arc<dyn TaskStore>,
}

impl TasksSummaryTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TasksSummaryTool {
    fn name(&self) -> &'static str {
        "mcp-tasks-summary"
    }

    fn description(&self) -> &'static str {
        "Return task counts by status, earliest/latest due date, and the instant the summary was generated."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(HashMap::new(), &[])
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let counts = self
            .store
            .count_by_status()
            .await
            .map_err(|err| ToolError::internal(format!("could not load summary: {err}")))?;
        let earliest = self
            .store
            .earliest_due_date()
            .await
            .map_err(|err| ToolError::internal(format!("could not load summary: {err}")))?;
        let latest = self
            .store
            .latest_due_date()
            .await
            .map_err(|err| ToolError::internal(format!("could not load summary: {err}")))?;

        let mut by_status = serde_json::Map::new();
        let mut total: u64 = 0;
        for status in TaskStatus::ALL {
            let count = counts.get(&status).copied().unwrap_or(0);
            total += count;
            by_status.insert(status.as_str().to_string(), Value::from(count));
        }

        Ok(serde_json::json!({
            "countByStatus": Value::Object(by_status),
            "totalCount": total,
            "earliestDueDate": earliest.map(|d| d.to_string()),
            "latestDueDate": latest.map(|d| d.to_string()),
            "generatedAt": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

/// `mcp-tasks-list`: paged task list, optional status filter.
pub struct TasksListTool {
    store: Arc<dyn TaskStore>,
}

impl TasksListTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TasksListTool {
    fn name(&self) -> &'static str {
        "mcp-tasks-list"
    }

    fn description(&self) -> &'static str {
        "Return a page of tasks, sorted by id ascending, with an optional status filter."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = HashMap::new();
        properties.insert("page".to_string(), JsonSchema::integer_range("Zero-based page index", 0, i64::MAX));
        properties.insert(
            "pageSize".to_string(),
            JsonSchema::integer_range("Page size, clamped to 1-1000", 1, MAX_PAGE_SIZE as i64),
        );
        properties.insert(
            "status".to_string(),
            JsonSchema::string_enum(&["TODO", "IN_PROGRESS", "DONE"], "Optional status filter"),
        );
        JsonSchema::object(properties, &[])
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let page = args
            .get("page")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(0);

        let requested_page_size = args.get("pageSize").and_then(Value::as_u64).map(|v| v as u32);
        let page_size = match requested_page_size {
            None => DEFAULT_PAGE_SIZE,
            Some(size) if size < 1 => {
                warn!(requested = size, "pageSize below minimum, clamped to 1");
                1
            }
            Some(size) if size > MAX_PAGE_SIZE => {
                warn!(requested = size, "pageSize above maximum, clamped to {MAX_PAGE_SIZE}");
                MAX_PAGE_SIZE
            }
            Some(size) => size,
        };

        let status = match args.get("status") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(
                TaskStatus::parse(s)
                    .ok_or_else(|| ToolError::validation(format!("unknown status: {s}")))?,
            ),
            Some(_) => return Err(ToolError::validation("status must be a string")),
        };

        let (tasks, total) = self
            .store
            .list_paged(page, page_size, status)
            .await
            .map_err(|err| ToolError::internal(format!("could not list tasks: {err}")))?;

        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size as u64)
        };

        Ok(serde_json::json!({
            "tasks": tasks.iter().map(task_to_json).collect::<Vec<_>>(),
            "total": total,
            "page": page,
            "pageSize": page_size,
            "totalPages": total_pages,
        }))
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
    async fn summary_reports_zero_for_missing_statuses() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let tool = TasksSummaryTool::new(store);
        let result = tool.call(Value::Null, &ctx()).await.unwrap();
        assert_eq!(result["countByStatus"]["TODO"], 0);
        assert_eq!(result["totalCount"], 0);
    }

    #[tokio::test]
    async fn list_clamps_oversized_page_size() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let tool = TasksListTool::new(store);
        let result = tool
            .call(serde_json::json!({"pageSize": 5000}), &ctx())
            .await
            .unwrap();
        assert_eq!(result["pageSize"], MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn list_beyond_end_returns_empty_with_correct_total() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        store
            .insert_many(&[task_domain::NewTask {
                title: "only one".to_string(),
                description: None,
                status: TaskStatus::Todo,
                due_date: None,
            }])
            .await
            .unwrap();
        let tool = TasksListTool::new(store);
        let result = tool
            .call(serde_json::json!({"page": 5, "pageSize": 10}), &ctx())
            .await
            .unwrap();
        assert_eq!(result["tasks"].as_array().unwrap().len(), 0);
        assert_eq!(result["total"], 1);
    }
}
