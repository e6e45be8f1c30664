//! Emission Scheduler
//!
//! Drives periodic producers (heartbeats, feeds) into streams.
//!
//! ## Design
//! - One ticker task per scheduled producer, firing every `period`
//! - Ticks run on a fixed worker pool fed by a bounded queue
//! - Saturated pool: the ticker runs the tick itself (caller-runs), so ticks
//!   are delayed rather than queued without bound or dropped
//! - Shutdown stops the tickers, then drains the pool for at most
//!   `shutdown_timeout`; ticks still running are abandoned, never interrupted

mod pool;
mod producer;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::error::{SchedulerError, StreamError};
use crate::event_store::EventStreamRepository;
use crate::types::StreamId;

use pool::WorkerPool;
pub use pool::{Dispatch, DrainReport};
pub use producer::{from_fn, FnProducer, Heartbeat, Producer};

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed number of workers
    pub workers: usize,
    /// Slots in the hand-off queue between tickers and workers
    pub queue_capacity: usize,
    /// Interval between ticks of each task
    pub period: Duration,
    /// Grace period for in-flight ticks on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            period: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters exposed through [`EmissionScheduler::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Ticks handed to a worker
    pub dispatched: u64,
    /// Ticks run by the ticker because the pool was saturated
    pub caller_ran: u64,
    /// Ticks whose append failed
    pub failed: u64,
    /// Tasks currently scheduled
    pub active_tasks: usize,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    caller_ran: AtomicU64,
    failed: AtomicU64,
    active_tasks: AtomicUsize,
}

/// Result of [`EmissionScheduler::shutdown`]
pub type ShutdownReport = DrainReport;

/// Handle to one scheduled task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    stream_id: StreamId,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Stop issuing ticks for this task
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Periodic emission scheduler
pub struct EmissionScheduler {
    config: SchedulerConfig,
    repository: Arc<dyn EventStreamRepository>,
    pool: Arc<WorkerPool>,
    tickers: TaskTracker,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
}

impl EmissionScheduler {
    /// Start the worker pool; must be called inside a Tokio runtime
    pub fn start(config: SchedulerConfig, repository: Arc<dyn EventStreamRepository>) -> Self {
        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            period_ms = config.period.as_millis() as u64,
            "starting emission scheduler"
        );
        let pool = Arc::new(WorkerPool::new(config.workers, config.queue_capacity));
        Self {
            config,
            repository,
            pool,
            tickers: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Bind a producer to a stream and tick it every `period`
    ///
    /// The task runs until its handle is cancelled, the stream is deleted or
    /// the scheduler shuts down.
    pub fn schedule(
        &self,
        stream_id: StreamId,
        producer: Arc<dyn Producer>,
    ) -> Result<TaskHandle, SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        if self.repository.get(&stream_id).is_none() {
            return Err(StreamError::StreamNotFound(stream_id).into());
        }

        let token = self.shutdown.child_token();
        let ticker = Ticker {
            stream_id,
            producer,
            period: self.config.period,
            repository: Arc::clone(&self.repository),
            pool: Arc::clone(&self.pool),
            counters: Arc::clone(&self.counters),
            token: token.clone(),
        };

        self.counters.active_tasks.fetch_add(1, Ordering::SeqCst);
        self.tickers.spawn(ticker.run());

        Ok(TaskHandle { stream_id, token })
    }

    /// Stop ticking and drain in-flight ticks within the grace period
    pub async fn shutdown(&self) -> ShutdownReport {
        let deadline = Instant::now() + self.config.shutdown_timeout;
        self.shutdown.cancel();
        self.tickers.close();

        // A ticker may be busy running a tick in place; it counts against the grace period
        if tokio::time::timeout_at(deadline, self.tickers.wait()).await.is_err() {
            warn!("tickers did not stop within the shutdown timeout");
        }

        let report = self.pool.drain(deadline).await;
        info!(
            drained = report.drained,
            abandoned = report.abandoned,
            "emission scheduler stopped"
        );
        report
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            dispatched: self.counters.dispatched.load(Ordering::SeqCst),
            caller_ran: self.counters.caller_ran.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            active_tasks: self.counters.active_tasks.load(Ordering::SeqCst),
        }
    }
}

/// Periodic driver of one producer
struct Ticker {
    stream_id: StreamId,
    producer: Arc<dyn Producer>,
    period: Duration,
    repository: Arc<dyn EventStreamRepository>,
    pool: Arc<WorkerPool>,
    counters: Arc<Counters>,
    token: CancellationToken,
}

impl Ticker {
    async fn run(self) {
        debug!(stream_id = %self.stream_id, producer = self.producer.name(), "task scheduled");

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        // Late ticks are caught up, never skipped
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut tick: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = interval.tick() => {}
            }

            if self.repository.get(&self.stream_id).is_none() {
                info!(stream_id = %self.stream_id, "stream deleted, stopping task");
                self.token.cancel();
                break;
            }

            match self.pool.submit(self.job(tick)).await {
                Dispatch::Queued => {
                    self.counters.dispatched.fetch_add(1, Ordering::SeqCst);
                }
                Dispatch::CallerRuns => {
                    self.counters.caller_ran.fetch_add(1, Ordering::SeqCst);
                    debug!(stream_id = %self.stream_id, tick, "scheduler saturated, tick ran on caller");
                }
            }
            tick += 1;
        }

        self.counters.active_tasks.fetch_sub(1, Ordering::SeqCst);
        debug!(stream_id = %self.stream_id, ticks = tick, "task stopped");
    }

    fn job(&self, tick: u64) -> pool::Job {
        let stream_id = self.stream_id;
        let producer = Arc::clone(&self.producer);
        let repository = Arc::clone(&self.repository);
        let counters = Arc::clone(&self.counters);

        Box::new(move || {
            let result = repository
                .get(&stream_id)
                .ok_or(StreamError::StreamNotFound(stream_id))
                .and_then(|stream| stream.append(producer.produce(tick)));

            match result {
                Ok(event) => trace!(stream_id = %stream_id, event_id = %event.id, "tick appended"),
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    debug!(stream_id = %stream_id, tick, error = %e, "tick not appended");
                }
            }
        })
    }
}
