//! Prompt Provider (C9): three server-defined prompts, each resolving to
//! exactly one USER-role message over live store state (spec.md §4.7).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use control_plane::audit::{AuditCategory, AuditEvent};
use control_plane::AuditLog;
use mcp_protocol::mcp::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
use task_domain::{TaskStatus, TaskStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no such prompt: {0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

pub struct PromptProvider {
    store: Arc<dyn TaskStore>,
}

impl PromptProvider {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<Prompt> {
        vec![
            Prompt {
                name: "create-tasks-from-description".to_string(),
                description: "Draft a JSON task array from a free-text description.".to_string(),
                arguments: vec![PromptArgument {
                    name: "description".to_string(),
                    description: "Free-text description of the work to turn into tasks".to_string(),
                    required: true,
                }],
            },
            Prompt {
                name: "summarize-tasks-by-status".to_string(),
                description: "Summarize current task counts, optionally focused on one status.".to_string(),
                arguments: vec![PromptArgument {
                    name: "status".to_string(),
                    description: "Optional status to focus the summary on".to_string(),
                    required: false,
                }],
            },
            Prompt {
                name: "task-report-template".to_string(),
                description: "Render a brief or detailed task report template.".to_string(),
                arguments: vec![PromptArgument {
                    name: "format".to_string(),
                    description: "brief (default) or detailed".to_string(),
                    required: false,
                }],
            },
        ]
    }

    async fn get(&self, name: &str, args: &HashMap<String, String>) -> Result<GetPromptResult, PromptError> {
        match name {
            "create-tasks-from-description" => self.create_tasks_from_description(args),
            "summarize-tasks-by-status" => self.summarize_tasks_by_status(args).await,
            "task-report-template" => self.task_report_template(args).await,
            other => Err(PromptError::NotFound(other.to_string())),
        }
    }

    fn create_tasks_from_description(
        &self,
        args: &HashMap<String, String>,
    ) -> Result<GetPromptResult, PromptError> {
        let description = args
            .get("description")
            .ok_or_else(|| PromptError::Internal("description is required".to_string()))?;

        let text = format!(
            "Turn the following description into a JSON array of tasks, each with \
             \"title\" (required), and optionally \"description\", \"status\" \
             (one of TODO, IN_PROGRESS, DONE), and \"dueDate\" (YYYY-MM-DD).\n\n\
             Description:\n{description}"
        );
        Ok(GetPromptResult {
            description: Some("Draft a task array from a description".to_string()),
            messages: vec![PromptMessage::user(text)],
        })
    }

    async fn summarize_tasks_by_status(
        &self,
        args: &HashMap<String, String>,
    ) -> Result<GetPromptResult, PromptError> {
        let requested_status = match args.get("status") {
            None => None,
            Some(raw) => Some(
                TaskStatus::parse(raw).ok_or_else(|| PromptError::Internal(format!("unknown status: {raw}")))?,
            ),
        };

        let counts = self
            .store
            .count_by_status()
            .await
            .map_err(|err| PromptError::Internal(format!("could not load counts: {err}")))?;

        let text = match requested_status {
            Some(status) => {
                let count = counts.get(&status).copied().unwrap_or(0);
                format!(
                    "There are currently {count} tasks with status {}. Summarize what this \
                     implies for the team working through them.",
                    status.as_str()
                )
            }
            None => {
                let lines: Vec<String> = TaskStatus::ALL
                    .iter()
                    .map(|status| {
                        format!("{}: {}", status.as_str(), counts.get(status).copied().unwrap_or(0))
                    })
                    .collect();
                format!(
                    "Summarize the current task board given these counts by status:\n{}",
                    lines.join("\n")
                )
            }
        };

        Ok(GetPromptResult {
            description: Some("Summarize tasks by status".to_string()),
            messages: vec![PromptMessage::user(text)],
        })
    }

    async fn task_report_template(
        &self,
        args: &HashMap<String, String>,
    ) -> Result<GetPromptResult, PromptError> {
        let detailed = match args.get("format").map(String::as_str) {
            None | Some("brief") => false,
            Some("detailed") => true,
            Some(other) => return Err(PromptError::Internal(format!("unknown format: {other}"))),
        };

        let counts = self
            .store
            .count_by_status()
            .await
            .map_err(|err| PromptError::Internal(format!("could not load counts: {err}")))?;
        let total: u64 = TaskStatus::ALL.iter().map(|s| counts.get(s).copied().unwrap_or(0)).sum();

        let text = if detailed {
            let breakdown: Vec<String> = TaskStatus::ALL
                .iter()
                .map(|status| format!("- {}: {}", status.as_str(), counts.get(status).copied().unwrap_or(0)))
                .collect();
            format!(
                "Write a detailed task report. Total tasks: {total}.\n\nBreakdown by status:\n{}\n\n\
                 Include a recommendations section covering what to prioritize next.",
                breakdown.join("\n")
            )
        } else {
            format!("Write a brief task report. Total tasks: {total}.")
        };

        Ok(GetPromptResult {
            description: Some("Render a task report template".to_string()),
            messages: vec![PromptMessage::user(text)],
        })
    }
}

/// Run `get` through the audit envelope spec.md §4.7 requires: failures
/// are logged with detail, but the caller only ever sees a generic
/// message — the internal cause never crosses the boundary.
pub async fn get_prompt_audited(
    provider: &PromptProvider,
    audit: &AuditLog,
    name: &str,
    args: &HashMap<String, String>,
    correlation_id: &str,
) -> Result<GetPromptResult, PromptError> {
    match provider.get(name, args).await {
        Ok(result) => Ok(result),
        Err(err) => {
            audit.emit(AuditEvent {
                event_type: "PROMPT_GET_FAILURE".to_string(),
                category: AuditCategory::Prompt,
                description: format!("Failed to render prompt {name}"),
                timestamp: Utc::now(),
                correlation_id: correlation_id.to_string(),
                tool_name: None,
                metadata: HashMap::from([("prompt".to_string(), name.to_string())]),
                success: false,
                error_message: Some(err.to_string()),
            });
            Err(PromptError::Internal("could not render prompt".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use control_plane::AuditConfig;
    use task_domain::sqlite::SqliteStore;

    async fn provider() -> PromptProvider {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        PromptProvider::new(store)
    }

    #[tokio::test]
    async fn create_tasks_embeds_description_verbatim() {
        let provider = provider().await;
        let mut args = HashMap::new();
        args.insert("description".to_string(), "ship the release".to_string());
        let result = provider
            .get("create-tasks-from-description", &args)
            .await
            .unwrap();
        let PromptMessage { content, .. } = &result.messages[0];
        let mcp_protocol::mcp::PromptMessageContent::Text { text } = content;
        assert!(text.contains("ship the release"));
    }

    #[tokio::test]
    async fn missing_description_is_an_error() {
        let provider = provider().await;
        let err = provider
            .get("create-tasks-from-description", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::Internal(_)));
    }

    #[tokio::test]
    async fn detailed_report_includes_recommendations() {
        let provider = provider().await;
        let mut args = HashMap::new();
        args.insert("format".to_string(), "detailed".to_string());
        let result = provider.get("task-report-template", &args).await.unwrap();
        let PromptMessage { content, .. } = &result.messages[0];
        let mcp_protocol::mcp::PromptMessageContent::Text { text } = content;
        assert!(text.contains("recommendations"));
    }

    #[tokio::test]
    async fn unknown_prompt_name_is_not_found() {
        let provider = provider().await;
        let err = provider.get("does-not-exist", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, PromptError::NotFound(_)));
    }

    #[tokio::test]
    async fn audited_failure_never_leaks_internal_message() {
        let provider = provider().await;
        let audit = AuditLog::new(AuditConfig::default());
        let err = get_prompt_audited(&provider, &audit, "does-not-exist", &HashMap::new(), "corr-1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "could not render prompt");
    }
}
