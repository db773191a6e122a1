//! Fixed-concurrency executor for disk and network stages.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug_span, trace};

use crate::domain::entities::CacheKey;

/// Default number of stage tasks allowed to run at once.
pub const DEFAULT_WORKERS: usize = 5;

/// Runs stage tasks on a tokio runtime, at most `workers` at a time.
///
/// Spawning never blocks, so it is safe from a UI thread that is not
/// itself inside the runtime.
#[derive(Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("available", &self.permits.available_permits())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool spawning onto `handle`.
    #[must_use]
    pub fn new(handle: Handle, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Queues `task`, identified by `key` in traces.
    pub fn spawn<F>(&self, key: &CacheKey, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let span = debug_span!("image_task", key = %key);
        self.handle.spawn(
            async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                trace!("Worker acquired");
                task.await;
            }
            .instrument(span),
        );
    }

    /// Configured concurrency.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Workers currently idle.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(Handle::current(), 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        for i in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            let done_tx = done_tx.clone();
            pool.spawn(&CacheKey::new(format!("k{i}")), async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
        }

        for _ in 0..8 {
            done_rx.recv().await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_spawn_from_outside_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pool = WorkerPool::new(runtime.handle().clone(), 1);
        let (tx, rx) = std::sync::mpsc::channel();

        pool.spawn(&CacheKey::new("outside"), async move {
            let _ = tx.send(42);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pool = WorkerPool::new(runtime.handle().clone(), 0);
        assert_eq!(pool.workers(), 1);
    }
}
