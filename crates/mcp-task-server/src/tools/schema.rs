//! The hand-written Task DTO schema (spec.md §6: JSON Schema Generator is an
//! external collaborator; this server keeps the DTO as the single source of
//! truth and hand-writes an equivalent schema once, asserted against the
//! DTO's field set in tests — see DESIGN.md).

use std::collections::HashMap;

use mcp_protocol::mcp::JsonSchema;

/// Schema for one `Task`, as returned by `mcp-schema-tasks`.
pub fn task_schema() -> JsonSchema {
    let mut properties = HashMap::new();
    properties.insert("id".to_string(), JsonSchema::integer("Store-assigned task id"));
    properties.insert(
        "title".to_string(),
        JsonSchema::string_desc("Task title, 1-255 characters"),
    );
    properties.insert(
        "description".to_string(),
        JsonSchema::string_desc("Optional free-text description, at most 2000 characters"),
    );
    properties.insert(
        "status".to_string(),
        JsonSchema::string_enum(&["TODO", "IN_PROGRESS", "DONE"], "Task lifecycle state"),
    );
    properties.insert(
        "dueDate".to_string(),
        JsonSchema::string_desc("Optional due date, ISO-8601 calendar date"),
    );
    properties.insert(
        "createdAt".to_string(),
        JsonSchema::string_desc("Creation instant, RFC 3339"),
    );
    properties.insert(
        "updatedAt".to_string(),
        JsonSchema::string_desc("Last-update instant, RFC 3339"),
    );

    JsonSchema::object(properties, &["title", "status"])
}

/// The input schema shared by `mcp-tasks` and (after file parsing)
/// `mcp-tasks-from-file`: one task, without server-assigned fields.
pub fn new_task_schema() -> JsonSchema {
    let mut properties = HashMap::new();
    properties.insert(
        "title".to_string(),
        JsonSchema::string_desc("Task title, 1-255 characters"),
    );
    properties.insert(
        "description".to_string(),
        JsonSchema::string_desc("Optional free-text description, at most 2000 characters"),
    );
    properties.insert(
        "status".to_string(),
        JsonSchema::string_enum(&["TODO", "IN_PROGRESS", "DONE"], "Task lifecycle state"),
    );
    properties.insert(
        "dueDate".to_string(),
        JsonSchema::string_desc("Optional due date, ISO-8601 calendar date"),
    );
    JsonSchema::object(properties, &["title", "status"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_schema_matches_task_dto_field_set() {
        let JsonSchema::Object { properties, required, .. } = task_schema() else {
            panic!("expected object schema");
        };
        let expected: std::collections::HashSet<&str> = [
            "id",
            "title",
            "description",
            "status",
            "dueDate",
            "createdAt",
            "updatedAt",
        ]
        .into_iter()
        .collect();
        let actual: std::collections::HashSet<&str> =
            properties.keys().map(|s| s.as_str()).collect();
        assert_eq!(actual, expected);
        assert_eq!(required, vec!["title", "status"]);
    }
}
