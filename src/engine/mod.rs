//! The concurrent processing engine
//!
//! Composed of four small, separately testable pieces driven by
//! [`ProcessingEngine`]:
//! - [`TraversalCursor`] walks the bookmark tree in deterministic order
//! - [`BoundedWorkerPool`] caps per-stage concurrency
//! - [`RateLimiter`] enforces per-stage request budgets
//! - [`RetryPolicy`] retries transient failures with backoff

pub mod cursor;
pub mod pool;
pub mod processor;
pub mod rate_limit;
pub mod retry;

pub use cursor::TraversalCursor;
pub use pool::BoundedWorkerPool;
pub use processor::{EngineState, ProcessingEngine, RunMode, RunOutcome};
pub use rate_limit::RateLimiter;
pub use retry::{RetryError, RetryPolicy};
