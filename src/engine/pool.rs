//! Bounded worker pool
//!
//! Caps the number of concurrently in-flight operations against one external
//! dependency. Each stage of the pipeline (fetch, summarize) owns its own
//! pool, so one stage stalling never starves the other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds concurrent in-flight operations to a fixed maximum
///
/// Slot grants are FIFO relative to slot availability (tokio semaphore
/// fairness); completion order is unconstrained.
pub struct BoundedWorkerPool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    capacity: usize,
    active: AtomicUsize,
    high_water: AtomicUsize,
}

impl BoundedWorkerPool {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            active: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    /// Runs `op` once a slot is free, releasing the slot when `op` completes,
    /// fails, or the returned future is dropped mid-flight.
    pub async fn run<F, T>(&self, op: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        // The semaphore is never closed while the pool exists
        let _permit = self
            .semaphore
            .acquire()
            .await
            .unwrap_or_else(|_| unreachable!("pool semaphore closed"));

        let _gauge = ActiveGuard::enter(self);
        op.await
    }

    /// Number of operations currently in flight
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest concurrent in-flight count observed so far
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Drop guard keeping the active gauge correct even under cancellation
struct ActiveGuard<'a> {
    pool: &'a BoundedWorkerPool,
}

impl<'a> ActiveGuard<'a> {
    fn enter(pool: &'a BoundedWorkerPool) -> Self {
        let now_active = pool.active.fetch_add(1, Ordering::SeqCst) + 1;
        pool.high_water.fetch_max(now_active, Ordering::SeqCst);
        tracing::trace!("{} pool: {}/{} active", pool.name, now_active, pool.capacity);
        Self { pool }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.pool.active.fetch_sub(1, Ordering::SeqCst);
    }
}
