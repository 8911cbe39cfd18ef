//! The cross-cutting control plane (C5 Rate Limiter, C6 Audit Log,
//! correlation-id propagation, API key comparison).

pub mod api_key;
pub mod audit;
pub mod correlation;
pub mod rate_limit;

pub use api_key::ApiKeyGate;
pub use audit::{AuditCategory, AuditConfig, AuditEvent, AuditLog, SanitizeStrategy};
pub use correlation::{correlation_id_or_new, new_correlation_id};
pub use rate_limit::{BucketConfig, ConsumeResult, RateLimitConfig, RateLimiter};
