//! Correlation-ID propagation (spec.md §5).
//!
//! Propagated as an explicit argument threaded through every call, never
//! through a thread-local — that keeps the same code correct whether the
//! call stays on the request task or crosses into the Worker Pool, where a
//! thread-local would silently detach from the originating context.

use uuid::Uuid;

/// Generate a new correlation id for a request that didn't supply one.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Pick the transport-supplied id if present, otherwise mint one. A
/// nested scope must never overwrite an id that already exists
/// (spec.md §5) — callers enforce that by only calling this once, at the
/// point a request first enters the system.
pub fn correlation_id_or_new(supplied: Option<String>) -> String {
    supplied.unwrap_or_else(new_correlation_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplied_id_is_preserved() {
        assert_eq!(
            correlation_id_or_new(Some("existing".to_string())),
            "existing"
        );
    }

    #[test]
    fn missing_id_is_generated() {
        let id = correlation_id_or_new(None);
        assert_eq!(id.len(), 36);
    }
}
