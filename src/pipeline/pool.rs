//! Bounded fan-out/fan-in worker pool.
//!
//! Every item gets its own task. A semaphore caps how many run at once, a
//! `JoinSet` tracks the outstanding ones, and a single coordinator task owns
//! the last sender of the result stream. The coordinator drops that sender
//! only after every worker has been joined, so the stream closes exactly
//! once and after every send.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Result stream buffer size.
pub const DEFAULT_BUFFER: usize = 100;

/// Upper bound on concurrent tasks.
pub const MAX_CONCURRENCY: usize = 256;

/// Counts reported by the coordinator once the stream is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks spawned.
    pub dispatched: usize,
    /// Results sent on the stream.
    pub emitted: usize,
    /// Tasks that finished without a result.
    pub skipped: usize,
    /// Tasks that never ran because the pool was cancelled.
    pub cancelled: usize,
    /// Tasks that panicked.
    pub panicked: usize,
}

/// Receiving side of a pool run.
pub struct ResultStream<R> {
    /// Closed by the coordinator after the last worker finishes.
    pub results: mpsc::Receiver<R>,
    /// Resolves to the run's stats once the stream is closed.
    pub completion: JoinHandle<PoolStats>,
}

enum WorkerOutcome {
    Emitted,
    Skipped,
    Cancelled,
}

/// Runs one task per item with at most `concurrency` in flight.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    buffer: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool. Concurrency is clamped to `1..=MAX_CONCURRENCY`.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            buffer: DEFAULT_BUFFER,
            cancel: CancellationToken::new(),
        }
    }

    /// Tie the pool to a cancellation token. Tasks still waiting for a
    /// permit when it fires never run.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Token that stops the pool and anything built on it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Dispatch `task` over `items` and return the result stream.
    ///
    /// A task returning `None` is counted as skipped and sends nothing.
    /// Must be called from within a tokio runtime.
    pub fn run<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> ResultStream<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<R>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.buffer);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let task = Arc::new(task);
        let dispatched = items.len();
        let mut workers = JoinSet::new();

        debug!(
            "Dispatching {} tasks with concurrency {}",
            dispatched, self.concurrency
        );

        for item in items {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            let cancel = self.cancel.clone();

            workers.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return WorkerOutcome::Cancelled,
                    },
                };

                match (*task)(item).await {
                    Some(result) => {
                        if tx.send(result).await.is_err() {
                            debug!("Result stream receiver dropped, discarding result");
                            return WorkerOutcome::Skipped;
                        }
                        WorkerOutcome::Emitted
                    }
                    None => WorkerOutcome::Skipped,
                }
            });
        }

        let completion = tokio::spawn(async move {
            let mut stats = PoolStats {
                dispatched,
                ..Default::default()
            };

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(WorkerOutcome::Emitted) => stats.emitted += 1,
                    Ok(WorkerOutcome::Skipped) => stats.skipped += 1,
                    Ok(WorkerOutcome::Cancelled) => stats.cancelled += 1,
                    Err(e) => {
                        error!("Worker task failed: {}", e);
                        stats.panicked += 1;
                    }
                }
            }

            // Last sender; dropping it closes the stream.
            drop(tx);
            debug!("All workers finished: {:?}", stats);
            stats
        });

        ResultStream {
            results: rx,
            completion,
        }
    }
}
