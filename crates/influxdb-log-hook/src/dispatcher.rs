// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch dispatcher: decouples log producers from the backing-store writer.
//!
//! ```text
//!    ┌──────────────┐
//!    │   Handles    │ (any number of producers, never do I/O)
//!    └──────┬───────┘
//!           │ bounded queue
//!           v
//!    ┌──────────────┐
//!    │   Service    │ (single worker task, owns the pending batch)
//!    └──────┬───────┘
//!           │ size or interval trigger
//!           v
//!    ┌──────────────┐
//!    │ PointWriter  │
//!    └──────────────┘
//! ```
//!
//! The worker wakes up on either a received point or a flush tick. After
//! handling the wake-up it flushes when a tick fired or the pending batch
//! reached `batch_size`, as long as something is pending. A single write never
//! carries more than `batch_size` points, oldest first.
//!
//! A failed flush keeps the pending batch and retries it on the next trigger.
//! After `max_flush_attempts` consecutive failures the batch is dropped. Every
//! failure is logged and, when subscribed, reported as a [`FlushFailure`].

use crate::config::{Backpressure, DispatcherConfig};
use crate::errors::{ConfigError, FlushError, SubmitError};
use crate::point::Point;
use crate::writer::{BatchPoints, BatchPointsConfig, PointWriter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};

tokio::task_local! {
    static WORKER: ();
}

/// Whether the caller is running on a dispatcher worker task.
///
/// Anything logged from there, including by the writer's own dependencies,
/// must not be fed back into the queue the worker is draining.
#[must_use]
pub fn in_worker_task() -> bool {
    WORKER.try_with(|_| ()).is_ok()
}

/// Reported for every failed flush attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushFailure {
    pub error: FlushError,
    /// Number of points in the failed write.
    pub points: usize,
    /// Consecutive failed attempt this failure represents, starting at 1.
    pub attempt: u32,
    /// Whether the points were dropped after this attempt.
    pub dropped: bool,
}

/// Counters returned by the worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub flushes: u64,
    pub flushed_points: u64,
    pub failed_flushes: u64,
    /// Points discarded after exhausting their flush attempts.
    pub dropped_points: u64,
    /// Points refused by a full queue.
    pub refused_points: u64,
}

/// Producer side of the dispatcher. Cheap to clone.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Point>,
    backpressure: Backpressure,
    refused: Arc<AtomicU64>,
}

impl DispatcherHandle {
    /// Enqueues a point for a later flush.
    ///
    /// Never performs network I/O. Under [`Backpressure::Block`] a full queue
    /// makes the caller wait for room; under [`Backpressure::DropNewest`] the
    /// point is refused with [`SubmitError::QueueFull`]. The worker itself is
    /// the only consumer, so a submit from the worker task is refused instead
    /// of waiting.
    pub fn submit(&self, point: Point) -> Result<(), SubmitError> {
        match self.tx.try_send(point) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(SubmitError::Closed),
            Err(TrySendError::Full(point)) => match self.backpressure {
                Backpressure::DropNewest => Err(self.refuse()),
                Backpressure::Block if in_worker_task() => Err(self.refuse()),
                Backpressure::Block => self.send_blocking(point),
            },
        }
    }

    /// Number of points refused because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.refused.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send_blocking(&self, point: Point) -> Result<(), SubmitError> {
        match Handle::try_current() {
            Err(_) => self
                .tx
                .blocking_send(point)
                .map_err(|_| SubmitError::Closed),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.tx.send(point)))
                    .map_err(|_| SubmitError::Closed)
            }
            // A current-thread runtime cannot run the worker while we wait.
            Ok(_) => Err(self.refuse()),
        }
    }

    fn refuse(&self) -> SubmitError {
        self.refused.fetch_add(1, Ordering::Relaxed);
        SubmitError::QueueFull
    }
}

/// Consumer side of the dispatcher: owns the queue receiver and the pending batch.
pub struct DispatcherService<W> {
    config: DispatcherConfig,
    batch_config: Arc<BatchPointsConfig>,
    writer: W,
    rx: mpsc::Receiver<Point>,
    pending: Vec<Point>,
    failed_attempts: u32,
    refused: Arc<AtomicU64>,
    reported_refused: u64,
    failures: Option<mpsc::UnboundedSender<FlushFailure>>,
    cancel_token: CancellationToken,
    stats: DispatcherStats,
}

impl<W: PointWriter + 'static> DispatcherService<W> {
    /// Creates the service and its producer handle.
    ///
    /// The service does nothing until [`DispatcherService::spawn`] or
    /// [`DispatcherService::run`] is called.
    pub fn new(
        config: DispatcherConfig,
        batch_config: BatchPointsConfig,
        writer: W,
    ) -> Result<(Self, DispatcherHandle), ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity());
        let refused = Arc::new(AtomicU64::new(0));
        let handle = DispatcherHandle {
            tx,
            backpressure: config.backpressure,
            refused: Arc::clone(&refused),
        };
        let service = Self {
            pending: Vec::with_capacity(config.batch_size),
            config,
            batch_config: Arc::new(batch_config),
            writer,
            rx,
            failed_attempts: 0,
            refused,
            reported_refused: 0,
            failures: None,
            cancel_token: CancellationToken::new(),
            stats: DispatcherStats::default(),
        };

        Ok((service, handle))
    }

    /// Returns a channel receiving every flush failure from now on.
    ///
    /// Only the most recent subscriber receives failures.
    pub fn subscribe_failures(&mut self) -> mpsc::UnboundedReceiver<FlushFailure> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.failures = Some(tx);
        rx
    }

    /// Token that stops the worker when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Starts the worker on the current tokio runtime, inside the caller's span.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> DispatcherTask {
        let cancel_token = self.cancel_token.clone();
        let join = tokio::spawn(self.run().in_current_span());
        DispatcherTask { join, cancel_token }
    }

    /// Runs the worker loop until the cancel token fires or every handle is dropped.
    ///
    /// On exit the queue is drained and whatever is pending gets a final flush.
    pub async fn run(self) -> DispatcherStats {
        WORKER.scope((), self.run_loop()).await
    }

    async fn run_loop(mut self) -> DispatcherStats {
        debug!("Batch dispatcher started");

        let period = self.config.flush_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let mut timeout = false;

            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("Batch dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    timeout = true;
                }
                received = self.rx.recv() => match received {
                    Some(point) => self.pending.push(point),
                    None => {
                        debug!("All dispatcher handles dropped, shutting down");
                        break;
                    }
                },
            }

            if timeout || self.pending.len() >= self.config.batch_size {
                self.flush_due(timeout).await;
            }
        }

        self.drain().await;
        self.stats.refused_points = self.refused.load(Ordering::Relaxed);

        debug!("Batch dispatcher stopped");
        self.stats
    }

    async fn drain(&mut self) {
        self.rx.close();
        while let Some(point) = self.rx.recv().await {
            self.pending.push(point);
        }
        // Each failed attempt counts towards the drop limit, so this terminates.
        while !self.pending.is_empty() {
            self.flush().await;
        }
    }

    /// Flushes full batches, or everything pending when `all` is set, until a
    /// write fails.
    async fn flush_due(&mut self, all: bool) {
        while !self.pending.is_empty() && (all || self.pending.len() >= self.config.batch_size) {
            if !self.flush().await {
                break;
            }
        }
    }

    /// Writes the oldest `batch_size` pending points. Returns whether the write succeeded.
    async fn flush(&mut self) -> bool {
        self.log_refused();

        let n_take = self.pending.len().min(self.config.batch_size);
        let batch = BatchPoints::new(
            Arc::clone(&self.batch_config),
            self.pending.drain(..n_take).collect(),
        );
        let n_points = batch.len();
        debug!("Flushing {n_points} points");

        let flush_timeout = self.config.flush_timeout;
        let result = match time::timeout(flush_timeout, self.writer.write(&batch)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FlushError::Write(e)),
            Err(_) => Err(FlushError::Timeout(flush_timeout)),
        };

        match result {
            Ok(()) => {
                debug!("Successfully flushed {n_points} points");
                self.failed_attempts = 0;
                self.stats.flushes += 1;
                self.stats.flushed_points += n_points as u64;
                true
            }
            Err(error) => {
                self.failed_attempts += 1;
                self.stats.failed_flushes += 1;
                let attempt = self.failed_attempts;
                let dropped = attempt >= self.config.max_flush_attempts;

                if dropped {
                    error!(
                        "Failed to flush {n_points} points after {attempt} attempts, dropping them: {error}"
                    );
                    self.failed_attempts = 0;
                    self.stats.dropped_points += n_points as u64;
                } else {
                    warn!(
                        "Failed to flush {n_points} points (attempt {attempt}/{}), will retry on next trigger: {error}",
                        self.config.max_flush_attempts
                    );
                    let mut retry = batch.points;
                    retry.append(&mut self.pending);
                    self.pending = retry;
                }

                self.report(FlushFailure {
                    error,
                    points: n_points,
                    attempt,
                    dropped,
                });
                false
            }
        }
    }

    fn report(&self, failure: FlushFailure) {
        if let Some(tx) = &self.failures {
            if tx.send(failure).is_err() {
                debug!("Flush failure receiver dropped");
            }
        }
    }

    fn log_refused(&mut self) {
        let refused = self.refused.load(Ordering::Relaxed);
        if refused > self.reported_refused {
            warn!(
                "{} points refused by a full queue since the last flush",
                refused - self.reported_refused
            );
            self.reported_refused = refused;
        }
    }
}

/// A running dispatcher worker.
#[derive(Debug)]
pub struct DispatcherTask {
    join: JoinHandle<DispatcherStats>,
    cancel_token: CancellationToken,
}

impl DispatcherTask {
    /// Signals the worker to flush what it holds and stop, then waits for it.
    pub async fn shutdown(self) -> Result<DispatcherStats, JoinError> {
        self.cancel_token.cancel();
        self.join.await
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
