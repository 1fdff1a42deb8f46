//! Bounded fan-out of fallible tasks

use crate::error::{CloudError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Upper bound for the default pool size
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Runs tasks with at most `size` of them in flight.
///
/// Tasks start as soon as a permit is free; [`WorkerPool::close_and_wait`]
/// collects every error, in no particular order.
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<()>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tasks: JoinSet::new(),
            size,
        }
    }

    /// `min(available cpus, 8)`
    pub fn default_size() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_DEFAULT_WORKERS)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Schedule a task
    pub fn add<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| CloudError::Panic(format!("worker pool closed: {e}")))?;
            task.await
        });
    }

    /// Wait for every task added so far and return the errors they produced
    pub async fn close_and_wait(mut self) -> Vec<CloudError> {
        let mut errors = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(join_err) => {
                    error!(error = %join_err, "Worker task failed");
                    errors.push(CloudError::Panic(join_err.to_string()));
                }
            }
        }
        debug!(errors = errors.len(), "Worker pool drained");
        errors
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}
