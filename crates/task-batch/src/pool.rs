//! Worker Pool (C4): a bounded queue drained by a fixed set of workers.
//!
//! The collaborator's `corePoolSize`/`maxPoolSize` elastic thread-pool
//! distinction collapses to one fixed-size pool here — idiomatic async
//! Rust spawns a fixed number of long-running tasks rather than growing a
//! thread count under load (see DESIGN.md).

use std::sync::Arc;
use std::time::{Duration, Instant};

use task_domain::{NewTask, TaskStore};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::inserter::insert_job_tasks;
use crate::registry::JobRegistry;
use crate::CHUNK_SIZE;

/// One unit of work handed to the pool by the Tool Registry.
pub struct BatchSubmission {
    pub job_id: String,
    pub tasks: Vec<NewTask>,
    /// Invoked at 0% and 100% only (spec.md §4.3/§4.4 Open Question 1).
    /// Never aborts the job if it panics or is slow to return — callers
    /// own that tradeoff.
    pub progress: Option<Arc<dyn Fn(u8) + Send + Sync>>,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub core_pool_size: usize,
    pub queue_capacity: usize,
    pub termination_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_pool_size: 4,
            queue_capacity: 64,
            termination_seconds: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("executor queue full")]
    QueueFull,
    #[error("worker pool is shutting down")]
    Closed,
}

/// A fixed pool of `tokio::spawn`ed workers draining a bounded channel.
/// `submit` uses `try_send`, so a full queue is rejected synchronously
/// rather than buffered unboundedly (spec.md §4.4).
pub struct WorkerPool {
    sender: mpsc::Sender<BatchSubmission>,
    workers: Vec<JoinHandle<()>>,
    termination: Duration,
}

impl WorkerPool {
    pub fn new(
        config: PoolConfig,
        registry: Arc<JobRegistry>,
        store: Arc<dyn TaskStore>,
        on_job_done: Arc<dyn Fn(&str, bool) + Send + Sync>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..config.core_pool_size)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let registry = registry.clone();
                let store = store.clone();
                let on_job_done = on_job_done.clone();
                tokio::spawn(async move {
                    loop {
                        let submission = {
                            let mut guard = receiver.lock().await;
                            guard.recv().await
                        };
                        let Some(submission) = submission else {
                            break;
                        };
                        let job_id = submission.job_id.clone();
                        let succeeded =
                            run_submission(worker_id, &registry, store.as_ref(), submission).await;
                        on_job_done(&job_id, succeeded);
                    }
                })
            })
            .collect();

        Self {
            sender,
            workers,
            termination: Duration::from_secs(config.termination_seconds),
        }
    }

    /// Reject-on-full submission (spec.md §4.3 step 2, §4.4 Policy).
    pub fn submit(&self, submission: BatchSubmission) -> Result<(), PoolError> {
        self.sender.try_send(submission).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PoolError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PoolError::Closed,
        })
    }

    /// Graceful shutdown: close the queue (no new work accepted) and wait
    /// up to `terminationSeconds` for in-flight jobs to reach a terminal
    /// state (spec.md §4.4).
    pub async fn shutdown(self) {
        drop(self.sender);
        let join_all = futures::future::join_all(self.workers);
        if tokio::time::timeout(self.termination, join_all).await.is_err() {
            warn!(
                termination_seconds = self.termination.as_secs(),
                "worker pool shutdown timed out with jobs still in flight"
            );
        }
    }
}

/// Runs one submission to completion and reports whether it ended in
/// `COMPLETED` (`true`) or `FAILED` (`false`).
async fn run_submission(
    worker_id: usize,
    registry: &JobRegistry,
    store: &dyn TaskStore,
    submission: BatchSubmission,
) -> bool {
    let BatchSubmission {
        job_id,
        tasks,
        progress,
    } = submission;

    if let Err(err) = registry.start(&job_id).await {
        error!(worker_id, job_id, error = %err, "failed to mark job running");
        return false;
    }
    if let Some(cb) = &progress {
        cb(0);
    }

    let started = Instant::now();
    let succeeded = match insert_job_tasks(store, tasks, CHUNK_SIZE).await {
        Ok(inserted) => {
            let duration_ms = started.elapsed().as_millis() as i64;
            if let Err(err) = registry
                .update_processed(&job_id, inserted.len() as i64)
                .await
            {
                error!(worker_id, job_id, error = %err, "failed to record processed count");
            }
            if let Err(err) = registry.complete(&job_id, duration_ms).await {
                error!(worker_id, job_id, error = %err, "failed to mark job completed");
            }
            true
        }
        Err(err) => {
            let duration_ms = started.elapsed().as_millis() as i64;
            // Infrastructure detail never reaches the stored message; the
            // store error's `Display` output is itself already scrubbed of
            // raw driver text by `task_domain::StoreError`'s variants, but
            // we still avoid echoing it as-is to stay conservative.
            let message = "batch insert failed".to_string();
            warn!(worker_id, job_id, error = %err, "batch insert failed");
            if let Err(err) = registry.fail(&job_id, &message, Some(duration_ms)).await {
                error!(worker_id, job_id, error = %err, "failed to mark job failed");
            }
            false
        }
    };

    if let Some(cb) = &progress {
        cb(100);
    }
    succeeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_domain::{sqlite::SqliteStore, JobStatus, JobStore, TaskStatus};

    fn task(n: usize) -> NewTask {
        NewTask {
            title: format!("task {n}"),
            description: None,
            status: TaskStatus::Todo,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn submission_completes_and_reports_progress_at_0_and_100() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let job_store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let registry = Arc::new(JobRegistry::new(job_store.clone()));

        let job = registry.create_job(5).await.unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();

        let pool = WorkerPool::new(
            PoolConfig {
                core_pool_size: 1,
                queue_capacity: 4,
                termination_seconds: 5,
            },
            registry.clone(),
            store,
            Arc::new(|_, _| {}),
        );

        pool.submit(BatchSubmission {
            job_id: job.id.clone(),
            tasks: (0..5).map(task).collect(),
            progress: Some(Arc::new(move |pct| seen2.lock().unwrap().push(pct))),
        })
        .unwrap();

        pool.shutdown().await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 100]);
        let done = JobStore::find_by_id(job_store.as_ref(), &job.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.processed_tasks, 5);
    }

    #[tokio::test]
    async fn full_queue_rejects_with_try_send() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let job_store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let registry = Arc::new(JobRegistry::new(job_store));

        // Zero core workers: nothing ever drains the queue, so the first
        // submission fills it and the second is rejected immediately.
        let pool = WorkerPool::new(
            PoolConfig {
                core_pool_size: 0,
                queue_capacity: 1,
                termination_seconds: 1,
            },
            registry.clone(),
            store,
            Arc::new(|_, _| {}),
        );

        let job_a = registry.create_job(1).await.unwrap();
        let job_b = registry.create_job(1).await.unwrap();

        pool.submit(BatchSubmission {
            job_id: job_a.id,
            tasks: vec![task(0)],
            progress: None,
        })
        .unwrap();

        let rejected = pool.submit(BatchSubmission {
            job_id: job_b.id,
            tasks: vec![task(0)],
            progress: None,
        });

        assert!(matches!(rejected, Err(PoolError::QueueFull)));
    }
}
