//! JSON wire shapes for domain types. Kept separate from `task_domain`'s
//! `Task`/`BatchJob` so the storage-facing structs stay free to use Rust's
//! natural `snake_case` field names while the client-facing JSON stays
//! `camelCase` per spec.md §3/§6.

use serde_json::{json, Value};
use task_domain::{BatchJob, NewTask, Task, TaskStatus, ValidationError};

pub fn task_to_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "status": task.status.as_str(),
        "dueDate": task.due_date.map(|d| d.to_string()),
        "createdAt": task.created_at.to_rfc3339(),
        "updatedAt": task.updated_at.to_rfc3339(),
    })
}

/// `progressPercent`/`tasksPerSecond`/`durationMs`/`errorMessage`/`completedAt`
/// are only meaningful once the job has progressed far enough to compute
/// them; spec.md §4.2 has them omitted from the object rather than present
/// as `null`, so this builds the object field-by-field instead of through
/// `json!()`.
pub fn job_to_json(job: &BatchJob) -> Value {
    let mut fields = serde_json::Map::new();
    fields.insert("jobId".to_string(), Value::String(job.id.clone()));
    fields.insert("status".to_string(), Value::String(job.status.as_str().to_string()));
    fields.insert("totalTasks".to_string(), Value::from(job.total_tasks));
    fields.insert("processedTasks".to_string(), Value::from(job.processed_tasks));
    fields.insert("createdAt".to_string(), Value::String(job.created_at.to_rfc3339()));

    if job.total_tasks > 0 {
        let progress_percent = job.processed_tasks.saturating_mul(100) / job.total_tasks;
        fields.insert("progressPercent".to_string(), Value::from(progress_percent));
    }
    if let Some(duration_ms) = job.duration_ms {
        fields.insert("durationMs".to_string(), Value::from(duration_ms));
        if duration_ms > 0 && job.processed_tasks > 0 {
            let tasks_per_second = job.processed_tasks.saturating_mul(1000) / duration_ms;
            fields.insert("tasksPerSecond".to_string(), Value::from(tasks_per_second));
        }
    }
    if let Some(error_message) = &job.error_message {
        fields.insert("errorMessage".to_string(), Value::String(error_message.clone()));
    }
    if let Some(completed_at) = job.completed_at {
        fields.insert("completedAt".to_string(), Value::String(completed_at.to_rfc3339()));
    }

    Value::Object(fields)
}

/// Parse one task submission item from client JSON into a `NewTask`,
/// reporting the same `ValidationError` vocabulary a missing/malformed
/// field would otherwise need a bespoke message for.
pub fn parse_new_task(value: &Value) -> Result<NewTask, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "task must be a JSON object".to_string())?;

    let title = match obj.get("title") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("title must be a string".to_string()),
        None => return Err(ValidationError::EmptyTitle.to_string()),
    };

    let description = match obj.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err("description must be a string".to_string()),
    };

    let status = match obj.get("status") {
        None | Some(Value::Null) => TaskStatus::Todo,
        Some(Value::String(s)) => {
            TaskStatus::parse(s).ok_or_else(|| format!("status must be one of TODO, IN_PROGRESS, DONE, got {s}"))?
        }
        Some(_) => return Err("status must be a string".to_string()),
    };

    let due_date = match obj.get("dueDate") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| format!("dueDate must be an ISO-8601 date, got {s}"))?,
        ),
        Some(_) => return Err("dueDate must be a string".to_string()),
    };

    let task = NewTask {
        title,
        description,
        status,
        due_date,
    };
    task.validate().map_err(|e| e.to_string())?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_task() {
        let value = json!({"title": "Write tests"});
        let task = parse_new_task(&value).unwrap();
        assert_eq!(task.title, "Write tests");
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn rejects_nested_object_title() {
        let value = json!({"title": {"nested": true}});
        let err = parse_new_task(&value).unwrap_err();
        assert!(err.contains("title must be a string"));
    }

    #[test]
    fn rejects_unknown_status() {
        let value = json!({"title": "x", "status": "WONTFIX"});
        assert!(parse_new_task(&value).is_err());
    }
}
