//! Retry policy with exponential backoff
//!
//! Wraps a fallible async operation. Transient failures are retried with
//! exponential backoff; a server-signaled 429 gets a separate, configurable
//! cool-down; permanent failures short-circuit. The rate-limit permit is
//! re-acquired for every attempt so retries cannot sneak past the limiter.

use crate::engine::rate_limit::RateLimiter;
use crate::{ErrorKind, StageError, StageResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a retried operation did not produce a value
#[derive(Debug)]
pub enum RetryError {
    /// The run was interrupted; the item carries no outcome and will be
    /// re-processed on the next run
    Cancelled,

    /// Permanent failure or retries exhausted; carries the last stage error
    Failed(StageError),
}

/// Bounded-retry policy for one pipeline stage
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts = 1 + retry_attempts
    max_attempts: u32,

    /// Backoff for attempt n is base_delay * 2^(n-1), capped at max_delay
    base_delay: Duration,
    max_delay: Duration,

    /// Cool-down applied after a 429 instead of ordinary backoff
    rate_limit_cooldown: Duration,
}

impl RetryPolicy {
    pub fn new(retry_attempts: u32, base_delay: Duration, rate_limit_cooldown: Duration) -> Self {
        Self {
            max_attempts: retry_attempts + 1,
            base_delay,
            max_delay: Duration::from_secs(60),
            rate_limit_cooldown,
        }
    }

    /// Runs `op` until it succeeds, fails permanently, exhausts attempts, or
    /// the token is cancelled.
    ///
    /// Every attempt first waits on `limiter`; the backoff between attempts
    /// and the limiter wait itself are both interrupted by cancellation.
    pub async fn run<T, F, Fut>(
        &self,
        limiter: &RateLimiter,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StageResult<T>>,
    {
        let mut attempt = 1;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = limiter.acquire() => {}
            }

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if error.kind == ErrorKind::Permanent {
                tracing::debug!("Permanent failure, not retrying: {}", error);
                return Err(RetryError::Failed(error));
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    "Giving up after {} attempts: {}",
                    self.max_attempts,
                    error
                );
                return Err(RetryError::Failed(error));
            }

            let delay = self.delay_for(attempt, error.kind);
            tracing::debug!(
                "Attempt {}/{} failed ({}), retrying in {:?}",
                attempt,
                self.max_attempts,
                error,
                delay
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    fn delay_for(&self, attempt: u32, kind: ErrorKind) -> Duration {
        match kind {
            ErrorKind::RateLimited => self.rate_limit_cooldown,
            _ => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base_delay
                    .saturating_mul(factor)
                    .min(self.max_delay)
            }
        }
    }
}
