//! `mcp-help` and `mcp-schema-tasks`: static catalogue and DTO schema
//! tools (spec.md §4.2). Neither touches the store.

use std::collections::HashMap;

use async_trait::async_trait;
use mcp_protocol::mcp::JsonSchema;
use serde_json::Value;

use crate::tool::{Tool, ToolContext, ToolOutcome};

const TOOL_CATALOGUE: &[(&str, &str)] = &[
    ("mcp-help", "Return this tool catalogue and a suggested workflow."),
    ("mcp-schema-tasks", "Return the JSON Schema of the Task DTO."),
    (
        "mcp-tasks-summary",
        "Aggregate task counts by status plus earliest/latest due date.",
    ),
    ("mcp-tasks-list", "Paged task list, with an optional status filter."),
    (
        "mcp-tasks",
        "Submit up to 5000 inline tasks for asynchronous creation.",
    ),
    (
        "mcp-tasks-from-file",
        "Import a JSON array of tasks from a whitelisted .json file.",
    ),
    ("mcp-job-status", "Poll the status of a batch job by id."),
];

const SUGGESTED_WORKFLOW: &str = "Call mcp-schema-tasks to see the Task shape, submit work with \
mcp-tasks or mcp-tasks-from-file, then poll mcp-job-status until the job reaches COMPLETED or \
FAILED. Use mcp-tasks-list and mcp-tasks-summary to inspect the resulting data.";

/// `mcp-help`: tool catalogue + suggested workflow.
pub struct HelpTool;

#[async_trait]
impl Tool for HelpTool {
    fn name(&self) -> &'static str {
        "mcp-help"
    }

    fn description(&self) -> &'static str {
        "Return the tool catalogue and a suggested workflow for using this server."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(HashMap::new(), &[])
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let tools: Vec<Value> = TOOL_CATALOGUE
            .iter()
            .map(|(name, description)| serde_json::json!({"name": name, "description": description}))
            .collect();
        Ok(serde_json::json!({
            "tools": tools,
            "suggestedWorkflow": SUGGESTED_WORKFLOW,
        }))
    }
}

/// `mcp-schema-tasks`: the Task DTO's JSON Schema.
pub struct SchemaTasksTool;

#[async_trait]
impl Tool for SchemaTasksTool {
    fn name(&self) -> &'static str {
        "mcp-schema-tasks"
    }

    fn description(&self) -> &'static str {
        "Return the JSON Schema of the Task DTO."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(HashMap::new(), &[])
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
        serde_json::to_value(super::schema::task_schema())
            .map_err(|err| crate::tool::ToolError::internal(format!("could not render schema: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext {
            correlation_id: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn help_lists_all_seven_tools() {
        let result = HelpTool.call(Value::Null, &ctx()).await.unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn schema_tasks_returns_an_object_schema() {
        let result = SchemaTasksTool.call(Value::Null, &ctx()).await.unwrap();
        assert_eq!(result["type"], "object");
    }
}
