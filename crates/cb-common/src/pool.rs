//! Bounded background task pool.
//!
//! Gates how many event-log callbacks run at once so ingestion rate stays
//! decoupled from processing rate. Width is a configuration knob. `spawn`
//! is fire-and-forget, `run` is submit-and-wait; both block the submitter
//! while the pool is saturated.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Fixed-width pool of concurrent tokio tasks.
#[derive(Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    width: usize,
}

impl TaskPool {
    /// Create a pool running at most `width` tasks concurrently.
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "pool width must be at least 1");
        Self {
            permits: Arc::new(Semaphore::new(width)),
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Permits currently available; `0` means the pool is saturated.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Submit a task and detach. Waits for a free slot before spawning.
    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("task pool semaphore closed");
        tokio::spawn(async move {
            task.await;
            drop(permit);
        });
    }

    /// Submit a task and wait for its result.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("task pool semaphore closed");
        let handle = tokio::spawn(async move {
            let out = task.await;
            drop(permit);
            out
        });
        handle.await.expect("pooled task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_submitted_work() {
        let pool = TaskPool::new(2);
        let result = pool.run(async { 21 * 2 }).await;
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn width_bounds_concurrency() {
        let pool = TaskPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let active = active.clone();
            let peak = peak.clone();
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.run(async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn spawn_detaches() {
        let pool = TaskPool::new(1);
        let done = Arc::new(AtomicUsize::new(0));
        let flag = done.clone();
        pool.spawn(async move {
            flag.store(1, Ordering::SeqCst);
        })
        .await;

        // Saturating the pool forces the detached task to have finished.
        pool.run(async {}).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
