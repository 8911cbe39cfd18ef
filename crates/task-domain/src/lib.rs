//! Task/BatchJob domain model and the Task Store Adapter contract (C1).
//!
//! The relational store and its migrations are an external collaborator per
//! spec.md §1/§6; this crate defines the contract surface the core uses
//! (`TaskStore`, `JobStore`) and ships one concrete, minimal instance of it
//! (`sqlite::SqliteStore`) so the server is runnable end to end.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A task's lifecycle state. Exactly one of these three values — never a
/// fourth — per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TODO" => Some(TaskStatus::Todo),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "DONE" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// The persisted task entity. Never mutated or deleted by the core once
/// created (spec.md §3 — update/delete are future work).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The caller-supplied fields needed to create one task, before the store
/// assigns `id`/`created_at`/`updated_at`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
}

/// Domain validation for a single task. This is the hand-written stand-in
/// for the Bean-Validation collaborator (out of scope per spec.md §1/§6;
/// see DESIGN.md).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title must be at most 255 characters")]
    TitleTooLong,
    #[error("description must be at most 2000 characters")]
    DescriptionTooLong,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.title.chars().count() > 255 {
            return Err(ValidationError::TitleTooLong);
        }
        if let Some(desc) = &self.description {
            if desc.chars().count() > 2000 {
                return Err(ValidationError::DescriptionTooLong);
            }
        }
        Ok(())
    }
}

/// A batch job's lifecycle state. The only transitions are
/// `Pending -> Running -> {Completed | Failed}` and `Pending -> Failed`
/// (executor rejection) — spec.md §3, §8 invariant #1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// The persisted batch job entity (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub status: JobStatus,
    pub total_tasks: i64,
    pub processed_tasks: i64,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Errors surfaced by a `TaskStore`/`JobStore` implementation. Infrastructure
/// detail (`sqlx::Error` `Display` text) must be scrubbed before reaching a
/// client — that scrubbing happens at the tool-handler boundary
/// (spec.md §7), not here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("job not found: {0}")]
    JobNotFound(String),
}

/// The Task Store Adapter contract (C1): the persistence surface the core
/// consumes from the relational store collaborator (spec.md §6).
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_many(&self, tasks: &[NewTask]) -> Result<Vec<Task>, StoreError>;
    /// Insert every task across `chunks` inside a single transaction, so a
    /// failure partway through leaves none of them persisted — the Batch
    /// Inserter (C2) relies on this for its per-job atomicity guarantee.
    /// Chunks are consumed and flushed one at a time inside the
    /// transaction, bounding how many rows the implementation must stage
    /// in any single `INSERT`.
    async fn insert_chunks_atomic(
        &self,
        chunks: Vec<Vec<NewTask>>,
    ) -> Result<Vec<Task>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, StoreError>;
    async fn list_all(&self, limit: u32) -> Result<Vec<Task>, StoreError>;
    async fn list_paged(
        &self,
        page: u32,
        page_size: u32,
        status: Option<TaskStatus>,
    ) -> Result<(Vec<Task>, u64), StoreError>;
    async fn count_by_status(&self) -> Result<HashMap<TaskStatus, u64>, StoreError>;
    async fn earliest_due_date(&self) -> Result<Option<NaiveDate>, StoreError>;
    async fn latest_due_date(&self) -> Result<Option<NaiveDate>, StoreError>;
}

/// The Job Registry's persistence surface (also part of C1's contract, kept
/// as a separate trait since ownership of job mutation sits with the Job
/// Registry exclusively — spec.md §3 Ownership).
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, id: &str, total_tasks: i64) -> Result<BatchJob, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<BatchJob>, StoreError>;
    async fn find_by_statuses(&self, statuses: &[JobStatus]) -> Result<Vec<BatchJob>, StoreError>;
    async fn mark_running(&self, id: &str) -> Result<(), StoreError>;
    async fn update_processed(&self, id: &str, processed_tasks: i64) -> Result<(), StoreError>;
    async fn mark_completed(&self, id: &str, duration_ms: i64) -> Result<(), StoreError>;
    async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        duration_ms: Option<i64>,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_title_rejected() {
        let task = NewTask {
            title: "   ".to_string(),
            description: None,
            status: TaskStatus::Todo,
            due_date: None,
        };
        assert_eq!(task.validate(), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn overlong_title_rejected() {
        let task = NewTask {
            title: "x".repeat(256),
            description: None,
            status: TaskStatus::Todo,
            due_date: None,
        };
        assert_eq!(task.validate(), Err(ValidationError::TitleTooLong));
    }

    #[test]
    fn status_round_trips() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
    }
}
