//! Bounded pool for blocking work (rasterization, image encoding, file I/O).
//!
//! The pool is created once at startup, handed to the pipeline, and drained on
//! shutdown. Each job holds a semaphore permit for its lifetime, so at most
//! `size` jobs run on tokio's blocking threads at once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::error::ProcessingError;

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        debug!(size, "Worker pool created");
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run a blocking closure on the pool and await its result.
    pub async fn run<F, T>(&self, job: F) -> Result<T, ProcessingError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProcessingError::PoolClosed)?;

        let handle = self.tracker.spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        handle.await.map_err(|e| ProcessingError::Worker {
            message: e.to_string(),
        })
    }

    /// Stop accepting jobs and wait for the running ones to finish.
    pub async fn shutdown(&self) {
        self.permits.close();
        self.tracker.close();
        self.tracker.wait().await;
        info!(size = self.size, "Worker pool drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let pool = WorkerPool::new(2);
        let value = pool.run(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6).map(|_| {
            let running = running.clone();
            let peak = peak.clone();
            pool.run(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
            })
        });
        for result in futures::future::join_all(jobs).await {
            result.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_rejects_jobs_after_shutdown() {
        let pool = WorkerPool::new(1);
        pool.shutdown().await;
        let result = pool.run(|| ()).await;
        assert!(matches!(result, Err(ProcessingError::PoolClosed)));
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let pool = WorkerPool::new(1);
        let result = pool.run(|| -> u8 { panic!("boom") }).await;
        assert!(matches!(result, Err(ProcessingError::Worker { .. })));
    }
}
