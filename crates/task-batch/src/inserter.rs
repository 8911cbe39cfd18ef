//! Batch Inserter (C2): chunked, memory-bounded, per-job-atomic persistence.

use task_domain::{NewTask, StoreError, Task, TaskStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsertError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Split `tasks` into fixed-size chunks and persist them as one atomic
/// unit (spec.md §4.3 step 4: "at most `chunk` tasks held live at any
/// time; partial progress is not retained on failure").
pub async fn insert_job_tasks(
    store: &dyn TaskStore,
    tasks: Vec<NewTask>,
    chunk_size: usize,
) -> Result<Vec<Task>, InsertError> {
    let chunks: Vec<Vec<NewTask>> = tasks
        .chunks(chunk_size.max(1))
        .map(|c| c.to_vec())
        .collect();
    let inserted = store.insert_chunks_atomic(chunks).await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_domain::{sqlite::SqliteStore, TaskStatus};

    fn task(n: usize) -> NewTask {
        NewTask {
            title: format!("task {n}"),
            description: None,
            status: TaskStatus::Todo,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn chunks_all_tasks_and_returns_every_row() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let tasks: Vec<NewTask> = (0..123).map(task).collect();

        let inserted = insert_job_tasks(&store, tasks, 50).await.unwrap();
        assert_eq!(inserted.len(), 123);

        let (_, total) = store.list_paged(0, 200, None).await.unwrap();
        assert_eq!(total, 123);
    }

    #[tokio::test]
    async fn empty_batch_inserts_nothing() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let inserted = insert_job_tasks(&store, Vec::new(), 50).await.unwrap();
        assert!(inserted.is_empty());
    }
}
