//! An embedded SQLite instance of the Task Store Adapter contract.
//!
//! Grounded on `turul-mcp-session-storage`'s `sqlite.rs` (pool construction
//! via `SqliteConnectOptions`, table-creation-on-startup) and
//! `audit-trail-server`'s hand-rolled schema + `sqlx::Row` mapping.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;

use crate::{BatchJob, JobStatus, JobStore, NewTask, StoreError, Task, TaskStatus, TaskStore};

/// A `sqlx`-backed adapter over a single SQLite database holding the
/// `tasks` and `batch_jobs` tables (spec.md §3, §6).
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if necessary) the database at `path` and ensure both
    /// tables exist.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, convenient for tests and `stdio` quick-starts.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL,
                due_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);

            CREATE TABLE IF NOT EXISTS batch_jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                total_tasks INTEGER NOT NULL,
                processed_tasks INTEGER NOT NULL,
                duration_ms INTEGER,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON batch_jobs(status);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, StoreError> {
        let status: String = row.try_get("status")?;
        let due_date: Option<String> = row.try_get("due_date")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        Ok(Task {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Todo),
            due_date: due_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            created_at: parse_rfc3339(&created_at),
            updated_at: parse_rfc3339(&updated_at),
        })
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<BatchJob, StoreError> {
        let status: String = row.try_get("status")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        let completed_at: Option<String> = row.try_get("completed_at")?;
        Ok(BatchJob {
            id: row.try_get("id")?,
            status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
            total_tasks: row.try_get("total_tasks")?,
            processed_tasks: row.try_get("processed_tasks")?,
            duration_ms: row.try_get("duration_ms")?,
            error_message: row.try_get("error_message")?,
            created_at: parse_rfc3339(&created_at),
            updated_at: parse_rfc3339(&updated_at),
            completed_at: completed_at.map(|d| parse_rfc3339(&d)),
        })
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn insert_many(&self, tasks: &[NewTask]) -> Result<Vec<Task>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = Vec::with_capacity(tasks.len());
        for task in tasks {
            let due_date = task.due_date.map(|d| d.format("%Y-%m-%d").to_string());
            let result = sqlx::query(
                "INSERT INTO tasks (title, description, status, due_date, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status.as_str())
            .bind(&due_date)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            inserted.push(Task {
                id: result.last_insert_rowid(),
                title: task.title.clone(),
                description: task.description.clone(),
                status: task.status,
                due_date: task.due_date,
                created_at: parse_rfc3339(&now),
                updated_at: parse_rfc3339(&now),
            });
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_chunks_atomic(
        &self,
        chunks: Vec<Vec<NewTask>>,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = Vec::new();
        for chunk in chunks {
            for task in &chunk {
                let due_date = task.due_date.map(|d| d.format("%Y-%m-%d").to_string());
                let result = sqlx::query(
                    "INSERT INTO tasks (title, description, status, due_date, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&task.title)
                .bind(&task.description)
                .bind(task.status.as_str())
                .bind(&due_date)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
                inserted.push(Task {
                    id: result.last_insert_rowid(),
                    title: task.title.clone(),
                    description: task.description.clone(),
                    status: task.status,
                    due_date: task.due_date,
                    created_at: parse_rfc3339(&now),
                    updated_at: parse_rfc3339(&now),
                });
            }
        }
        // A failure anywhere above returns before this point, dropping `tx`
        // and rolling back every chunk already staged in this job.
        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn list_all(&self, limit: u32) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY id ASC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn list_paged(
        &self,
        page: u32,
        page_size: u32,
        status: Option<TaskStatus>,
    ) -> Result<(Vec<Task>, u64), StoreError> {
        let offset = (page as i64) * (page_size as i64);
        let (rows, total) = match status {
            Some(status) => {
                let rows = sqlx::query(
                    "SELECT * FROM tasks WHERE status = ? ORDER BY id ASC LIMIT ? OFFSET ?",
                )
                .bind(status.as_str())
                .bind(page_size)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: i64 = sqlx::query("SELECT COUNT(*) AS c FROM tasks WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await?
                    .try_get("c")?;
                (rows, total)
            }
            None => {
                let rows = sqlx::query("SELECT * FROM tasks ORDER BY id ASC LIMIT ? OFFSET ?")
                    .bind(page_size)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?;
                let total: i64 = sqlx::query("SELECT COUNT(*) AS c FROM tasks")
                    .fetch_one(&self.pool)
                    .await?
                    .try_get("c")?;
                (rows, total)
            }
        };
        let tasks = rows.iter().map(Self::row_to_task).collect::<Result<_, _>>()?;
        Ok((tasks, total.max(0) as u64))
    }

    async fn count_by_status(&self) -> Result<HashMap<TaskStatus, u64>, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS c FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = HashMap::new();
        for row in &rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("c")?;
            if let Some(status) = TaskStatus::parse(&status) {
                counts.insert(status, count.max(0) as u64);
            }
        }
        Ok(counts)
    }

    async fn earliest_due_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        let row = sqlx::query("SELECT MIN(due_date) AS d FROM tasks WHERE due_date IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        let value: Option<String> = row.try_get("d")?;
        Ok(value.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()))
    }

    async fn latest_due_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        let row = sqlx::query("SELECT MAX(due_date) AS d FROM tasks WHERE due_date IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        let value: Option<String> = row.try_get("d")?;
        Ok(value.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()))
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn create(&self, id: &str, total_tasks: i64) -> Result<BatchJob, StoreError> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        sqlx::query(
            "INSERT INTO batch_jobs (id, status, total_tasks, processed_tasks, created_at, updated_at) \
             VALUES (?, 'PENDING', ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(total_tasks)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&self.pool)
        .await?;
        Ok(BatchJob {
            id: id.to_string(),
            status: JobStatus::Pending,
            total_tasks,
            processed_tasks: 0,
            duration_ms: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BatchJob>, StoreError> {
        let row = sqlx::query("SELECT * FROM batch_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn find_by_statuses(&self, statuses: &[JobStatus]) -> Result<Vec<BatchJob>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT * FROM batch_jobs WHERE status IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_job).collect()
    }

    async fn mark_running(&self, id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE batch_jobs SET status = 'RUNNING', updated_at = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_processed(&self, id: &str, processed_tasks: i64) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE batch_jobs SET processed_tasks = ?, updated_at = ? WHERE id = ?")
            .bind(processed_tasks)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, id: &str, duration_ms: i64) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE batch_jobs SET status = 'COMPLETED', processed_tasks = total_tasks, \
             duration_ms = ?, completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(duration_ms)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        duration_ms: Option<i64>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE batch_jobs SET status = 'FAILED', error_message = ?, completed_at = ?, \
             updated_at = ?, duration_ms = COALESCE(?, duration_ms) WHERE id = ?",
        )
        .bind(error_message)
        .bind(&now)
        .bind(&now)
        .bind(duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_list_round_trips() {
        let store = store().await;
        let tasks = vec![NewTask {
            title: "write tests".to_string(),
            description: None,
            status: TaskStatus::Todo,
            due_date: None,
        }];
        let inserted = store.insert_many(&tasks).await.unwrap();
        assert_eq!(inserted.len(), 1);
        let (page, total) = store.list_paged(0, 100, None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].title, "write tests");
    }

    #[tokio::test]
    async fn job_lifecycle_transitions() {
        let store = store().await;
        let job = store.create("job-1", 3).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        store.mark_running("job-1").await.unwrap();
        let running = store.find_by_id("job-1").await.unwrap().unwrap();
        assert_eq!(running.status, JobStatus::Running);

        store.update_processed("job-1", 3).await.unwrap();
        store.mark_completed("job-1", 42).await.unwrap();
        let done = store.find_by_id("job-1").await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.processed_tasks, 3);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn find_by_statuses_filters() {
        let store = store().await;
        store.create("p1", 1).await.unwrap();
        store.create("p2", 1).await.unwrap();
        store.mark_running("p2").await.unwrap();

        let pending = store
            .find_by_statuses(&[JobStatus::Pending, JobStatus::Running])
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
    }
}
