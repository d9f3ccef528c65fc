//! FIFO serializer for generation jobs
//!
//! The external image backend tolerates very little concurrency, so every
//! generation in the process funnels through one queue: a single worker task
//! drains an mpsc channel and runs one thunk at a time. Submission never
//! blocks; callers get a [`JobHandle`] and suspend on it until their job has
//! reached the front and finished. A failed thunk fails only its own handle.
//!
//! The queue also owns the telemetry callers see: a pending counter
//! (incremented on enqueue, decremented when a job finishes either way) and
//! an exponential moving average of observed job durations used to estimate
//! the wait for a newly submitted job.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Weight kept from the previous average on each completion
const EMA_RETAIN: f64 = 0.7;
/// Weight given to the newly observed duration
const EMA_OBSERVE: f64 = 0.3;

type JobThunk = BoxFuture<'static, Result<Vec<u8>>>;

/// A job with its reply channel
struct QueuedJob {
    thunk: JobThunk,
    reply: oneshot::Sender<Result<Vec<u8>>>,
}

/// Configuration for the generation queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of pending jobs before submissions are rejected
    pub max_queue_size: usize,
    /// Duration estimate used before any job has completed
    pub initial_avg_duration_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            initial_avg_duration_ms: 12_000,
        }
    }
}

/// Point-in-time queue statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTelemetry {
    pub pending: u64,
    pub processed: u64,
    pub average_duration_ms: u64,
    pub estimated_wait_ms: u64,
}

struct Counters {
    pending: AtomicU64,
    processed: AtomicU64,
    avg_duration_ms: AtomicU64,
}

/// Serialized queue for generation jobs
pub struct GenerationQueue {
    job_tx: mpsc::UnboundedSender<QueuedJob>,
    counters: Arc<Counters>,
    config: QueueConfig,
}

impl GenerationQueue {
    /// Create a queue with default configuration
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a queue with custom configuration; spawns the worker task
    pub fn with_config(config: QueueConfig) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters {
            pending: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            avg_duration_ms: AtomicU64::new(config.initial_avg_duration_ms),
        });

        let worker_counters = counters.clone();
        tokio::spawn(async move {
            Self::run_jobs(job_rx, worker_counters).await;
        });

        Self {
            job_tx,
            counters,
            config,
        }
    }

    /// Append a job to the serialized pipeline.
    ///
    /// Returns immediately with a handle for the eventual result; the job
    /// runs after every previously accepted job has finished. A job cannot
    /// be withdrawn once accepted — dropping the handle only discards the
    /// result.
    pub fn enqueue<F>(&self, job: F) -> Result<JobHandle>
    where
        F: Future<Output = Result<Vec<u8>>> + Send + 'static,
    {
        let pending = self.counters.pending.load(Ordering::Relaxed);
        if pending >= self.config.max_queue_size as u64 {
            warn!(pending, "Generation queue is full");
            return Err(AppError::Internal("Generation queue is full".to_string()));
        }

        let (reply, reply_rx) = oneshot::channel();
        let queued = QueuedJob {
            thunk: Box::pin(job),
            reply,
        };

        self.counters.pending.fetch_add(1, Ordering::Relaxed);

        if self.job_tx.send(queued).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::Relaxed);
            return Err(AppError::Internal(
                "Generation worker is not running".to_string(),
            ));
        }

        debug!(pending = pending + 1, "Job queued");

        Ok(JobHandle { reply_rx })
    }

    /// Drain jobs one at a time; mutual exclusion and FIFO order follow from
    /// the single consumer
    async fn run_jobs(mut job_rx: mpsc::UnboundedReceiver<QueuedJob>, counters: Arc<Counters>) {
        while let Some(job) = job_rx.recv().await {
            let started = Instant::now();
            let result = job.thunk.await;

            // Bookkeeping runs regardless of the thunk's outcome
            let observed = started.elapsed().as_millis() as u64;
            let old_avg = counters.avg_duration_ms.load(Ordering::Relaxed);
            let new_avg =
                (old_avg as f64 * EMA_RETAIN + observed as f64 * EMA_OBSERVE).round() as u64;
            counters.avg_duration_ms.store(new_avg, Ordering::Relaxed);
            counters.pending.fetch_sub(1, Ordering::Relaxed);
            counters.processed.fetch_add(1, Ordering::Relaxed);

            debug!(
                duration_ms = observed,
                avg_duration_ms = new_avg,
                ok = result.is_ok(),
                "Job finished"
            );

            // The submitter may have gone away; the result is simply dropped
            let _ = job.reply.send(result);
        }
    }

    /// Number of jobs accepted but not yet finished, including the running one
    pub fn pending_count(&self) -> u64 {
        self.counters.pending.load(Ordering::Relaxed)
    }

    /// Number of jobs that have completed, successfully or not
    pub fn processed_count(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    /// Moving average of observed job durations
    pub fn average_duration_ms(&self) -> u64 {
        self.counters.avg_duration_ms.load(Ordering::Relaxed)
    }

    /// Estimated wait for a newly submitted job; the job already in flight
    /// does not count toward the wait
    pub fn estimated_wait_ms(&self) -> u64 {
        let pending = self.pending_count();
        pending.saturating_sub(1) * self.average_duration_ms()
    }

    /// Snapshot of all queue statistics
    pub fn telemetry(&self) -> QueueTelemetry {
        QueueTelemetry {
            pending: self.pending_count(),
            processed: self.processed_count(),
            average_duration_ms: self.average_duration_ms(),
            estimated_wait_ms: self.estimated_wait_ms(),
        }
    }
}

impl Default for GenerationQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for an accepted job's eventual result
pub struct JobHandle {
    reply_rx: oneshot::Receiver<Result<Vec<u8>>>,
}

impl JobHandle {
    /// Suspend until the job has run to completion
    pub async fn wait(self) -> Result<Vec<u8>> {
        match self.reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(AppError::Internal(
                "Generation worker stopped before the job completed".to_string(),
            )),
        }
    }
}
