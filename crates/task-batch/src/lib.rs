//! The asynchronous batch job engine (C2 Batch Inserter, C3 Job Registry,
//! C4 Worker Pool): bulk task submission, chunked persistence, and
//! lifecycle tracking for `BatchJob`.

pub mod inserter;
pub mod pool;
pub mod registry;

pub use inserter::{insert_job_tasks, InsertError};
pub use pool::{BatchSubmission, PoolConfig, PoolError, WorkerPool};
pub use registry::JobRegistry;

/// Tasks are flushed to the store in chunks of this size (spec.md §4.3
/// step 4).
pub const CHUNK_SIZE: usize = 50;

/// The largest batch a single `mcp-tasks` call may submit (spec.md §4.3).
pub const MAX_BATCH_SIZE: usize = 5000;
