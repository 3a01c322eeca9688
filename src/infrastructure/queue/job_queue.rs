use std::future::Future;
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is full")]
    Full,
    #[error("job queue is closed")]
    Closed,
}

/// Fixed-capacity multi-consumer queue drained by a fixed worker pool.
///
/// Workers pull from one shared channel, so whichever worker is free takes
/// the next job. Each worker handles one job at a time.
#[derive(Clone)]
pub struct JobQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    workers: usize,
}

impl<T: Send + 'static> JobQueue<T> {
    /// Zero capacity or workers fall back to the defaults.
    pub fn new(capacity: usize, workers: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx, workers }
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs waiting for a worker.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Wait for a free slot. Applies back-pressure to the caller instead of
    /// dropping the job.
    pub async fn enqueue(&self, job: T) -> Result<(), QueueError> {
        self.tx.send(job).await.map_err(|_| QueueError::Closed)
    }

    /// Non-blocking variant: reports [`QueueError::Full`] straight away.
    pub fn try_enqueue(&self, job: T) -> Result<(), QueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Wait at most `wait` for a free slot, then give up with
    /// [`QueueError::Full`]. A zero wait behaves like [`try_enqueue`](Self::try_enqueue).
    pub async fn enqueue_timeout(&self, job: T, wait: Duration) -> Result<(), QueueError> {
        if wait.is_zero() {
            return self.try_enqueue(job);
        }
        match tokio::time::timeout(wait, self.tx.send(job)).await {
            Ok(sent) => sent.map_err(|_| QueueError::Closed),
            Err(_) => Err(QueueError::Full),
        }
    }

    /// Close the queue: pending jobs can still be drained, new ones are refused.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    /// Spawn `workers` loops that run `handler` for each job until `cancel`
    /// fires or the queue is closed and empty.
    ///
    /// A job already inside `handler` is not interrupted; the handler gets the
    /// same token and is expected to observe it. The returned tracker is
    /// closed, so `tracker.wait()` resolves once every loop has exited.
    pub fn start<F, Fut>(&self, cancel: CancellationToken, handler: F) -> TaskTracker
    where
        F: Fn(CancellationToken, T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tracker = TaskTracker::new();
        for worker_id in 0..self.workers {
            let rx = self.rx.clone();
            let cancel = cancel.clone();
            let handler = handler.clone();
            tracker.spawn(async move {
                debug!(worker_id, "Worker started");
                loop {
                    let job = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        job = rx.recv() => match job {
                            Ok(job) => job,
                            Err(_) => break,
                        },
                    };
                    handler(cancel.clone(), job).await;
                }
                debug!(worker_id, "Worker stopped");
            });
        }
        tracker.close();
        info!(workers = self.workers, capacity = self.capacity(), "Worker pool started");
        tracker
    }
}
