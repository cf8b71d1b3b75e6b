//! Bounded-concurrency admission control for outbound requests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

/// Admits tasks immediately while fewer than `max_concurrent` are in flight,
/// otherwise holds them in FIFO order until a slot frees. Failure of one task
/// does not affect other queued or active tasks.
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: AtomicUsize,
    active: AtomicUsize,
    queued: AtomicUsize,
}

/// Default slots for general HTTP use
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Default slots for a well-behaved high-throughput provider
pub const HIGH_THROUGHPUT_CONCURRENCY: usize = 50;

impl ConcurrencyGate {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            limit: AtomicUsize::new(max_concurrent),
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        }
    }

    /// Run a unit of work under the gate, returning its result unchanged
    pub async fn run<T, F>(&self, task: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        self.queued.fetch_add(1, Ordering::SeqCst);
        // tokio semaphores are fair, so waiters are admitted in FIFO order
        let permit = self.semaphore.acquire().await.expect("gate semaphore closed");
        self.queued.fetch_sub(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);

        let result = task.await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        drop(permit);
        result
    }

    /// Number of tasks currently holding a slot
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting for a slot
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    /// Retune the number of slots. Increases take effect immediately; a
    /// decrease reclaims only currently-free slots, so in-flight tasks are
    /// never interrupted.
    pub fn set_limit(&self, max_concurrent: usize) {
        let max_concurrent = max_concurrent.max(1);
        let previous = self.limit.swap(max_concurrent, Ordering::SeqCst);
        if max_concurrent > previous {
            self.semaphore.add_permits(max_concurrent - previous);
        } else if max_concurrent < previous {
            let forgotten = self.semaphore.forget_permits(previous - max_concurrent);
            debug!(
                previous,
                max_concurrent, forgotten, "reduced concurrency gate limit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_runs_task_and_returns_result() {
        let gate = ConcurrencyGate::new(2);
        let result = gate.run(async { 41 + 1 }).await;
        assert_eq!(result, 42);
        assert_eq!(gate.active(), 0);
        assert_eq!(gate.queued(), 0);
    }

    #[tokio::test]
    async fn test_limits_in_flight_tasks() {
        let gate = Arc::new(ConcurrencyGate::new(2));
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));

        let mut join_set = JoinSet::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let peak = peak.clone();
            let current = current.clone();
            join_set.spawn(async move {
                gate.run(async {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            });
        }
        while join_set.join_next().await.is_some() {}

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.active(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_frees_slot() {
        let gate = Arc::new(ConcurrencyGate::new(1));

        let outcome: Result<(), &str> = gate.run(async { Err("boom") }).await;
        assert!(outcome.is_err());

        // The slot must be available again for the next task
        let result = gate.run(async { "still works" }).await;
        assert_eq!(result, "still works");
        assert_eq!(gate.active(), 0);
    }

    #[tokio::test]
    async fn test_set_limit_grows_capacity() {
        let gate = ConcurrencyGate::new(1);
        assert_eq!(gate.limit(), 1);
        gate.set_limit(50);
        assert_eq!(gate.limit(), 50);
        gate.set_limit(10);
        assert_eq!(gate.limit(), 10);
    }

    #[tokio::test]
    async fn test_minimum_of_one_slot() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.limit(), 1);
        let result = gate.run(async { 7 }).await;
        assert_eq!(result, 7);
    }
}
