//! Bounded worker pool with caller-runs backpressure
//!
//! Jobs are handed to a fixed set of workers through a bounded queue. When the
//! queue is full the submitting task runs the job itself on a blocking thread
//! and waits for it, so late ticks never pile up in memory and are never
//! dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

/// A unit of work executed on a blocking thread
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a submitted job was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to a worker
    Queued,
    /// Pool saturated (or closed); the submitter ran it and waited
    CallerRuns,
}

/// Outcome of draining the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// All queued and running jobs finished within the deadline
    pub drained: bool,
    /// Jobs still queued or running when the deadline passed
    pub abandoned: usize,
}

pub(crate) struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    workers: TaskTracker,
    outstanding: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `workers` workers behind a queue of `queue_capacity` slots
    pub(crate) fn new(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let outstanding = Arc::new(AtomicUsize::new(0));
        let tracker = TaskTracker::new();

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let outstanding = Arc::clone(&outstanding);
            tracker.spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else {
                        break;
                    };
                    if let Err(e) = tokio::task::spawn_blocking(job).await {
                        error!(worker, error = %e, "scheduled job panicked");
                    }
                    outstanding.fetch_sub(1, Ordering::SeqCst);
                }
                debug!(worker, "worker stopped");
            });
        }

        Self {
            tx: Mutex::new(Some(tx)),
            workers: tracker,
            outstanding,
        }
    }

    /// Queue a job, or run it on behalf of the caller when the queue is full
    ///
    /// The caller-runs path never executes the job on the async thread: it
    /// awaits the job on the blocking pool, which holds the submitter back
    /// without stalling the runtime.
    pub(crate) async fn submit(&self, job: Job) -> Dispatch {
        let rejected = {
            let guard = self.tx.lock();
            match guard.as_ref() {
                Some(tx) => {
                    self.outstanding.fetch_add(1, Ordering::SeqCst);
                    match tx.try_send(job) {
                        Ok(()) => None,
                        Err(TrySendError::Full(job)) | Err(TrySendError::Closed(job)) => {
                            self.outstanding.fetch_sub(1, Ordering::SeqCst);
                            Some(job)
                        }
                    }
                }
                None => Some(job),
            }
        };

        match rejected {
            None => Dispatch::Queued,
            Some(job) => {
                if let Err(e) = tokio::task::spawn_blocking(job).await {
                    error!(error = %e, "caller-run job panicked");
                }
                Dispatch::CallerRuns
            }
        }
    }

    /// Jobs queued or running
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Close the queue and wait for workers until `deadline`
    pub(crate) async fn drain(&self, deadline: Instant) -> DrainReport {
        drop(self.tx.lock().take());
        self.workers.close();

        match tokio::time::timeout_at(deadline, self.workers.wait()).await {
            Ok(()) => DrainReport {
                drained: true,
                abandoned: 0,
            },
            Err(_) => {
                let abandoned = self.outstanding();
                warn!(abandoned, "worker pool drain timed out, abandoning jobs");
                DrainReport {
                    drained: false,
                    abandoned,
                }
            }
        }
    }
}
