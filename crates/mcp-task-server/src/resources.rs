//! Resource Provider (C8): `task://all`, `task://{id}`, `db://stats`
//! (spec.md §4.6). A plain struct over the store contracts — no framework
//! macros, matching DESIGN.md's decision to drop the teacher's
//! derive-macro crate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use control_plane::audit::{AuditCategory, AuditEvent};
use control_plane::AuditLog;
use mcp_protocol::mcp::{Resource, ResourceContents, ResourceTemplate};
use task_domain::{TaskStatus, TaskStore};
use thiserror::Error;

use crate::tools::task_to_json;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

pub struct ResourceProvider {
    store: Arc<dyn TaskStore>,
    max_tasks: u32,
}

impl ResourceProvider {
    pub fn new(store: Arc<dyn TaskStore>, max_tasks: u32) -> Self {
        Self { store, max_tasks }
    }

    pub fn list(&self) -> Vec<Resource> {
        vec![
            Resource {
                uri: "task://all".to_string(),
                name: "All tasks".to_string(),
                description: Some(format!("Up to {} tasks, most recent first by id", self.max_tasks)),
                mime_type: "application/json".to_string(),
            },
            Resource {
                uri: "db://stats".to_string(),
                name: "Task store statistics".to_string(),
                description: Some("The same payload as mcp-tasks-summary".to_string()),
                mime_type: "application/json".to_string(),
            },
        ]
    }

    pub fn templates(&self) -> Vec<ResourceTemplate> {
        vec![ResourceTemplate {
            uri_template: "task://{id}".to_string(),
            name: "Single task".to_string(),
            description: Some("One task by its decimal id".to_string()),
            mime_type: "application/json".to_string(),
        }]
    }

    async fn read(&self, uri: &str) -> Result<ResourceContents, ResourceError> {
        match uri {
            "task://all" => self.read_all().await,
            "db://stats" => self.read_stats().await,
            other if other.starts_with("task://") => self.read_one(&other["task://".len()..]).await,
            other => Err(ResourceError::NotFound(format!("no such resource: {other}"))),
        }
    }

    async fn read_all(&self) -> Result<ResourceContents, ResourceError> {
        let tasks = self
            .store
            .list_all(self.max_tasks)
            .await
            .map_err(|err| ResourceError::Internal(format!("could not list tasks: {err}")))?;
        let body = serde_json::json!({
            "tasks": tasks.iter().map(task_to_json).collect::<Vec<_>>(),
        });
        Ok(ResourceContents {
            uri: "task://all".to_string(),
            mime_type: "application/json".to_string(),
            text: body.to_string(),
        })
    }

    async fn read_one(&self, raw_id: &str) -> Result<ResourceContents, ResourceError> {
        let id: i64 = raw_id
            .parse()
            .map_err(|_| ResourceError::NotFound(format!("not a decimal task id: {raw_id}")))?;
        let task = self
            .store
            .find_by_id(id)
            .await
            .map_err(|err| ResourceError::Internal(format!("could not load task: {err}")))?
            .ok_or_else(|| ResourceError::NotFound(format!("no task with id {id}")))?;
        Ok(ResourceContents {
            uri: format!("task://{id}"),
            mime_type: "application/json".to_string(),
            text: task_to_json(&task).to_string(),
        })
    }

    async fn read_stats(&self) -> Result<ResourceContents, ResourceError> {
        let counts = self
            .store
            .count_by_status()
            .await
            .map_err(|err| ResourceError::Internal(format!("could not load stats: {err}")))?;
        let earliest = self
            .store
            .earliest_due_date()
            .await
            .map_err(|err| ResourceError::Internal(format!("could not load stats: {err}")))?;
        let latest = self
            .store
            .latest_due_date()
            .await
            .map_err(|err| ResourceError::Internal(format!("could not load stats: {err}")))?;

        let mut by_status = HashMap::new();
        let mut total: u64 = 0;
        for status in TaskStatus::ALL {
            let count = counts.get(&status).copied().unwrap_or(0);
            total += count;
            by_status.insert(status.as_str().to_string(), count);
        }

        let body = serde_json::json!({
            "countByStatus": by_status,
            "totalCount": total,
            "earliestDueDate": earliest.map(|d| d.to_string()),
            "latestDueDate": latest.map(|d| d.to_string()),
            "generatedAt": Utc::now().to_rfc3339(),
        });
        Ok(ResourceContents {
            uri: "db://stats".to_string(),
            mime_type: "application/json".to_string(),
            text: body.to_string(),
        })
    }
}

/// Read one resource through the same start/success/failure audit envelope
/// every tool call goes through (spec.md §4.6).
pub async fn read_resource_audited(
    provider: &ResourceProvider,
    audit: &AuditLog,
    uri: &str,
    correlation_id: &str,
) -> Result<ResourceContents, ResourceError> {
    audit.emit(AuditEvent {
        event_type: "RESOURCE_READ_START".to_string(),
        category: AuditCategory::Resource,
        description: format!("Reading resource {uri}"),
        timestamp: Utc::now(),
        correlation_id: correlation_id.to_string(),
        tool_name: None,
        metadata: HashMap::from([("uri".to_string(), uri.to_string())]),
        success: true,
        error_message: None,
    });

    match provider.read(uri).await {
        Ok(contents) => {
            audit.emit(AuditEvent {
                event_type: "RESOURCE_READ_SUCCESS".to_string(),
                category: AuditCategory::Resource,
                description: format!("Read resource {uri}"),
                timestamp: Utc::now(),
                correlation_id: correlation_id.to_string(),
                tool_name: None,
                metadata: HashMap::from([("uri".to_string(), uri.to_string())]),
                success: true,
                error_message: None,
            });
            Ok(contents)
        }
        Err(err) => {
            let event_type = match &err {
                ResourceError::NotFound(_) => "RESOURCE_NOT_FOUND",
                ResourceError::Internal(_) => "RESOURCE_READ_FAILURE",
            };
            audit.emit(AuditEvent {
                event_type: event_type.to_string(),
                category: AuditCategory::Resource,
                description: format!("Failed to read resource {uri}"),
                timestamp: Utc::now(),
                correlation_id: correlation_id.to_string(),
                tool_name: None,
                metadata: HashMap::from([("uri".to_string(), uri.to_string())]),
                success: false,
                error_message: Some(err.to_string()),
            });
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use control_plane::AuditConfig;
    use task_domain::{sqlite::SqliteStore, NewTask};

    async fn store_with_one_task() -> Arc<dyn TaskStore> {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        store
            .insert_many(&[NewTask {
                title: "first".to_string(),
                description: None,
                status: TaskStatus::Todo,
                due_date: None,
            }])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn task_by_id_round_trips() {
        let provider = ResourceProvider::new(store_with_one_task().await, 1000);
        let contents = provider.read("task://1").await.unwrap();
        assert!(contents.text.contains("first"));
    }

    #[tokio::test]
    async fn mismatched_uri_is_not_found() {
        let provider = ResourceProvider::new(store_with_one_task().await, 1000);
        let err = provider.read("task://999").await.unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn audited_read_emits_start_and_success() {
        let provider = ResourceProvider::new(store_with_one_task().await, 1000);
        let audit = AuditLog::new(AuditConfig::default());
        let result = read_resource_audited(&provider, &audit, "db://stats", "corr-1")
            .await
            .unwrap();
        assert!(result.text.contains("totalCount"));
    }
}
