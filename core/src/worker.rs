//! Worker pool for deferred jobs
//!
//! A fixed number of worker slots drain an unbounded queue. Jobs carry no
//! result channel; they report their outcome through logging and whatever
//! state they capture.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error};

use crate::{Error, Result};

struct Job {
    label: String,
    fut: BoxFuture<'static, ()>,
}

/// Fixed-width pool executing submitted jobs asynchronously.
///
/// At most `workers` jobs run concurrently; the queue in front of them is
/// unbounded. A panicking job is caught and logged, it never takes the
/// dispatcher down. Must be created inside a Tokio runtime.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<Job>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "worker pool size must be positive");
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx, workers));
        Self { tx }
    }

    /// Queue a job for asynchronous execution.
    ///
    /// Fails only when the pool has shut down; the job future is dropped in
    /// that case, releasing whatever it owns.
    pub fn submit<F>(&self, label: impl Into<String>, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job {
            label: label.into(),
            fut: fut.boxed(),
        };
        self.tx
            .send(job)
            .map_err(|_| Error::WorkerPool("pool is shut down".to_string()))
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<Job>, workers: usize) {
    let slots = Arc::new(Semaphore::new(workers));

    // Ends when the last pool handle is dropped
    while let Some(job) = rx.recv().await {
        let slot = slots
            .clone()
            .acquire_owned()
            .await
            .expect("worker slot semaphore closed");

        tokio::spawn(async move {
            let _slot = slot;
            let Job { label, fut } = job;
            debug!(job = %label, "running job");
            if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(job = %label, "job panicked: {}", msg);
            }
        });
    }
}
