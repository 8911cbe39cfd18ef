//! Job Registry (C3): `BatchJob` lifecycle and startup orphan recovery.

use std::sync::Arc;

use chrono::Utc;
use task_domain::{BatchJob, JobStatus, JobStore, StoreError};
use tracing::{info, warn};
use uuid::Uuid;

/// Owns every state transition a `BatchJob` can make. No other component
/// mutates job rows directly (spec.md §3 Ownership).
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Create a new job in `PENDING` with a fresh UUID id.
    pub async fn create_job(&self, total_tasks: i64) -> Result<BatchJob, StoreError> {
        let id = Uuid::new_v4().to_string();
        let job = self.store.create(&id, total_tasks).await?;
        info!(job_id = %job.id, total_tasks, event = "BATCH_JOB_CREATED");
        Ok(job)
    }

    /// `PENDING -> RUNNING`. Called by the worker that picked the job up.
    pub async fn start(&self, job_id: &str) -> Result<(), StoreError> {
        self.store.mark_running(job_id).await?;
        info!(job_id, event = "BATCH_JOB_STARTED");
        Ok(())
    }

    pub async fn update_processed(&self, job_id: &str, processed: i64) -> Result<(), StoreError> {
        self.store.update_processed(job_id, processed).await
    }

    /// `RUNNING -> COMPLETED`.
    pub async fn complete(&self, job_id: &str, duration_ms: i64) -> Result<(), StoreError> {
        self.store.mark_completed(job_id, duration_ms).await?;
        info!(job_id, duration_ms, event = "BATCH_JOB_COMPLETED");
        Ok(())
    }

    /// `{PENDING | RUNNING} -> FAILED`. `error_message` must already be
    /// scrubbed of infrastructure detail (spec.md §7) before it reaches
    /// here.
    pub async fn fail(
        &self,
        job_id: &str,
        error_message: &str,
        duration_ms: Option<i64>,
    ) -> Result<(), StoreError> {
        self.store
            .mark_failed(job_id, error_message, duration_ms)
            .await?;
        warn!(job_id, error_message, event = "BATCH_JOB_FAILED");
        Ok(())
    }

    /// Executor-rejection shortcut: a job that never started still needs a
    /// terminal state and an audit trail entry (spec.md §4.3 step 2).
    pub async fn fail_rejected(&self, job_id: &str) -> Result<(), StoreError> {
        self.fail(job_id, "executor queue full", Some(0)).await
    }

    /// Startup recovery (spec.md §4.4): every job still `PENDING` or
    /// `RUNNING` when the process starts belongs to a run that never
    /// finished. Mark each `FAILED` before any new job is accepted; no
    /// task reconciliation is attempted, since the transactional insert
    /// already rolled back any partial writes.
    pub async fn recover_orphans(&self) -> Result<usize, StoreError> {
        let orphans = self
            .store
            .find_by_statuses(&[JobStatus::Pending, JobStatus::Running])
            .await?;
        let count = orphans.len();
        for job in &orphans {
            let duration_ms = Utc::now()
                .signed_duration_since(job.created_at)
                .num_milliseconds()
                .max(0);
            self.store
                .mark_failed(
                    &job.id,
                    "Server restarted during processing",
                    Some(duration_ms),
                )
                .await?;
            warn!(job_id = %job.id, event = "BATCH_JOB_ORPHAN_RECOVERED");
        }
        if count > 0 {
            info!(recovered = count, event = "BATCH_JOB_ORPHAN_RECOVERY_COMPLETE");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_domain::sqlite::SqliteStore;

    async fn registry() -> (JobRegistry, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        (JobRegistry::new(store.clone()), store)
    }

    #[tokio::test]
    async fn create_then_complete_round_trips() {
        let (registry, store) = registry().await;
        let job = registry.create_job(10).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        registry.start(&job.id).await.unwrap();
        registry.update_processed(&job.id, 10).await.unwrap();
        registry.complete(&job.id, 123).await.unwrap();

        let done = JobStore::find_by_id(store.as_ref(), &job.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.processed_tasks, 10);
        assert_eq!(done.duration_ms, Some(123));
    }

    #[tokio::test]
    async fn orphans_are_failed_on_recovery() {
        let (registry, store) = registry().await;
        let job = store.create("orphan-1", 5).await.unwrap();
        store.mark_running(&job.id).await.unwrap();

        let recovered = registry.recover_orphans().await.unwrap();
        assert_eq!(recovered, 1);

        let after = JobStore::find_by_id(store.as_ref(), "orphan-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.status, JobStatus::Failed);
        assert_eq!(
            after.error_message.as_deref(),
            Some("Server restarted during processing")
        );
    }

    #[tokio::test]
    async fn clean_jobs_are_untouched_by_recovery() {
        let (registry, store) = registry().await;
        let job = registry.create_job(1).await.unwrap();
        registry.start(&job.id).await.unwrap();
        registry.complete(&job.id, 1).await.unwrap();

        let recovered = registry.recover_orphans().await.unwrap();
        assert_eq!(recovered, 0);
    }
}
