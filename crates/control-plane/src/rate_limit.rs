//! Rate Limiter (C5): per-tool token buckets, allocated lazily and cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

/// One tool's bucket configuration (spec.md §4.4).
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub capacity: u64,
    pub refill_tokens: u64,
    pub refill_interval: Duration,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_tokens: 100,
            refill_interval: Duration::from_secs(60),
        }
    }
}

/// Rate limiter configuration: a default bucket shape plus per-tool
/// overrides (`rate-limit.tools.<name>.*` in spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct RateLimitConfig {
    pub default_bucket: BucketConfig,
    pub overrides: HashMap<String, BucketConfig>,
}

impl RateLimitConfig {
    fn config_for(&self, tool: &str) -> BucketConfig {
        self.overrides.get(tool).copied().unwrap_or(self.default_bucket)
    }
}

/// Classic token bucket with lazy, on-consume refill.
struct Bucket {
    capacity: u64,
    refill_tokens: u64,
    refill_interval: Duration,
    tokens: u64,
    last_refill: Instant,
}

impl Bucket {
    fn new(config: BucketConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_tokens: config.refill_tokens,
            refill_interval: config.refill_interval,
            tokens: config.capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill based on elapsed whole periods, then attempt to consume one
    /// token. Returns `(consumed, remaining, nanos_to_refill)` — the third
    /// value is always the time until the next token lands, used as the
    /// client retry hint on denial (spec.md §4.4).
    fn consume(&mut self) -> (bool, u64, u64) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill);
        if self.refill_interval > Duration::ZERO {
            let periods = elapsed.as_nanos() / self.refill_interval.as_nanos().max(1);
            if periods > 0 {
                let gained = (periods as u64).saturating_mul(self.refill_tokens);
                self.tokens = (self.tokens + gained).min(self.capacity);
                self.last_refill += self.refill_interval * (periods as u32);
            }
        }

        let consumed = self.tokens > 0;
        if consumed {
            self.tokens -= 1;
        }

        let since_refill = Instant::now().saturating_duration_since(self.last_refill);
        let nanos_to_refill = self
            .refill_interval
            .saturating_sub(since_refill)
            .as_nanos()
            .min(u64::MAX as u128) as u64;

        (consumed, self.tokens, nanos_to_refill)
    }
}

/// Result of a single rate-limit consultation.
#[derive(Debug, Clone, Copy)]
pub struct ConsumeResult {
    pub consumed: bool,
    pub remaining: u64,
    pub nanos_to_refill: u64,
}

impl ConsumeResult {
    /// `retryAfterSeconds = ceil(nanosToRefill / 1e9)` (spec.md §4.2 step 3).
    pub fn retry_after_seconds(&self) -> u64 {
        (self.nanos_to_refill + 999_999_999) / 1_000_000_000
    }
}

/// Per-tool token buckets, created lazily on first use and cached
/// in-memory for the lifetime of the process (explicitly not
/// cluster-aware — spec.md §1 Non-goals).
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    async fn bucket_for(&self, tool: &str) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.buckets.read().await.get(tool) {
            return bucket.clone();
        }
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(tool.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(self.config.config_for(tool)))))
            .clone()
    }

    pub async fn consume(&self, tool: &str) -> ConsumeResult {
        let bucket = self.bucket_for(tool).await;
        let mut bucket = bucket.lock().await;
        let (consumed, remaining, nanos_to_refill) = bucket.consume();
        ConsumeResult {
            consumed,
            remaining,
            nanos_to_refill,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_capacity_then_denies() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "mcp-tasks".to_string(),
            BucketConfig {
                capacity: 2,
                refill_tokens: 2,
                refill_interval: Duration::from_secs(60),
            },
        );
        let limiter = RateLimiter::new(RateLimitConfig {
            default_bucket: BucketConfig::default(),
            overrides,
        });

        let a = limiter.consume("mcp-tasks").await;
        let b = limiter.consume("mcp-tasks").await;
        let c = limiter.consume("mcp-tasks").await;

        assert!(a.consumed && b.consumed);
        assert!(!c.consumed);
        assert_eq!(c.remaining, 0);
        assert!(c.retry_after_seconds() > 0);
    }

    #[tokio::test]
    async fn different_tools_have_independent_buckets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            default_bucket: BucketConfig {
                capacity: 1,
                refill_tokens: 1,
                refill_interval: Duration::from_secs(60),
            },
            overrides: HashMap::new(),
        });

        assert!(limiter.consume("mcp-tasks").await.consumed);
        assert!(!limiter.consume("mcp-tasks").await.consumed);
        // A different tool's bucket is untouched.
        assert!(limiter.consume("mcp-help").await.consumed);
    }
}
