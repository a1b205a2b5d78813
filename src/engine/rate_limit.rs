//! Rolling-window rate limiter
//!
//! Bounds calls to one external dependency to a configured number per rolling
//! 60-second window. `acquire` only ever delays the caller; it cannot fail.
//! Two independent instances exist in a run (fetch, summarize) and never
//! block each other.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Issues permits at a bounded rate over a rolling window
///
/// Fairness: waiters queue on an async mutex, which tokio grants in FIFO
/// order, so the earliest waiter always receives the next available permit.
/// The holder sleeps with the lock held on purpose - releasing it would let
/// later arrivals race ahead of earlier ones.
pub struct RateLimiter {
    /// Permits per window; 0 disables limiting entirely
    max_per_window: u32,

    window: Duration,

    /// Issue times of permits still inside the window, oldest first
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_per_window` permits per rolling minute
    pub fn new(max_per_window: u32) -> Self {
        Self::with_window(max_per_window, Duration::from_secs(60))
    }

    /// Creates a limiter with a custom window length
    pub fn with_window(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            issued: Mutex::new(VecDeque::new()),
        }
    }

    /// Suspends the caller until issuing a permit stays within the rate
    ///
    /// Cancellation-safe: dropping the future before it returns leaves no
    /// permit recorded.
    pub async fn acquire(&self) {
        if self.max_per_window == 0 {
            return;
        }

        let mut issued = self.issued.lock().await;

        loop {
            let now = Instant::now();

            // Drop issue times that have aged out of the window
            while let Some(front) = issued.front() {
                if now.duration_since(*front) >= self.window {
                    issued.pop_front();
                } else {
                    break;
                }
            }

            if (issued.len() as u32) < self.max_per_window {
                issued.push_back(now);
                return;
            }

            // Full window: wait until the oldest permit expires
            let oldest = issued[0];
            let wait = self.window - now.duration_since(oldest);
            tracing::debug!(
                "Rate limit reached ({}/{}), waiting {:?}",
                issued.len(),
                self.max_per_window,
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }
}
