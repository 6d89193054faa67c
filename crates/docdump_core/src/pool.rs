//! Bounded worker pool for collection dump tasks.
//!
//! The full dump engine submits one job per collection and then waits at a
//! join barrier. The pool runs a fixed number of worker threads over a
//! shared queue, collects every job's result, and reports the first failure
//! as the outcome of the whole batch. Waiting is bounded: when the grace
//! period expires, remaining work is cancelled and the barrier returns
//! without waiting for it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};

/// How often the join barrier re-checks the cancel token while waiting.
const JOIN_POLL: Duration = Duration::from_millis(50);

type Job = Box<dyn FnOnce() -> CoreResult<u64> + Send + 'static>;

/// Cooperative cancellation flag shared between the pool, its jobs, and
/// outside callers.
///
/// Jobs observe the token between documents; the pool observes it between
/// jobs and while waiting at the join barrier.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns [`CoreError::Interrupted`] once cancellation has been
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Interrupted`] if the token is cancelled.
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// A fixed-size pool of worker threads with a join barrier.
///
/// Jobs return a document count; [`WorkerPool::join`] returns the sum over
/// all jobs, or the first error any job reported.
pub struct WorkerPool {
    queue: Option<Sender<Job>>,
    results: Receiver<CoreResult<u64>>,
    workers: Vec<JoinHandle<()>>,
    submitted: usize,
    cancel: CancelToken,
}

impl WorkerPool {
    /// Starts a pool with `workers` threads (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self::with_cancel(workers, CancelToken::new())
    }

    /// Starts a pool driven by an externally owned cancel token.
    ///
    /// Tripping `cancel` skips queued jobs and makes the join barrier
    /// return early, exactly as [`WorkerPool::cancel_token`] does.
    #[must_use]
    pub fn with_cancel(workers: usize, cancel: CancelToken) -> Self {
        let workers = workers.max(1);
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let handles = (0..workers)
            .map(|_| {
                let job_rx = Arc::clone(&job_rx);
                let result_tx = result_tx.clone();
                let cancel = cancel.clone();
                thread::spawn(move || worker_loop(&job_rx, &result_tx, &cancel))
            })
            .collect();

        Self {
            queue: Some(job_tx),
            results: result_rx,
            workers: handles,
            submitted: 0,
            cancel,
        }
    }

    /// Returns a token that cancels this pool's work when tripped.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Queues a job. Jobs start as soon as a worker is free.
    pub fn submit<F>(&mut self, job: F)
    where
        F: FnOnce() -> CoreResult<u64> + Send + 'static,
    {
        if let Some(queue) = &self.queue {
            if queue.send(Box::new(job)).is_ok() {
                self.submitted += 1;
            }
        }
    }

    /// Waits for all submitted jobs, bounded by `grace`.
    ///
    /// Returns the summed document count when every job succeeded. The
    /// first job failure becomes the batch's error; sibling jobs keep
    /// running and are drained normally. When `grace` expires, or an
    /// external cancel is observed while waiting, remaining work is
    /// cancelled and the barrier returns immediately with
    /// [`CoreError::Interrupted`].
    ///
    /// # Errors
    ///
    /// Returns the first job error, or [`CoreError::Interrupted`] on
    /// cancellation and grace expiry.
    pub fn join(mut self, grace: Duration) -> CoreResult<u64> {
        // Closing the queue lets idle workers exit once it drains.
        drop(self.queue.take());

        let deadline = Instant::now() + grace;
        let mut first_error: Option<CoreError> = None;
        let mut total = 0u64;
        let mut received = 0usize;

        while received < self.submitted {
            if first_error.is_none() && self.cancel.is_cancelled() {
                self.abandon();
                return Err(CoreError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                self.cancel.cancel();
                self.abandon();
                return Err(first_error.unwrap_or(CoreError::Interrupted));
            }
            let step = JOIN_POLL.min(deadline - now);
            match self.results.recv_timeout(step) {
                Ok(Ok(count)) => {
                    total += count;
                    received += 1;
                }
                Ok(Err(error)) => {
                    received += 1;
                    // Sibling jobs keep running; the barrier only remembers
                    // the first failure and reports it once drained.
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        if let Some(error) = first_error {
            return Err(error);
        }
        if received < self.submitted {
            // A worker died without reporting; the batch did not complete.
            return Err(CoreError::Interrupted);
        }
        Ok(total)
    }

    /// Detaches the worker threads so the barrier can return without
    /// waiting for in-flight jobs.
    fn abandon(&mut self) {
        self.workers.clear();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
        drop(self.queue.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

fn worker_loop(
    jobs: &Mutex<Receiver<Job>>,
    results: &Sender<CoreResult<u64>>,
    cancel: &CancelToken,
) {
    loop {
        let job = {
            let queue = jobs.lock();
            match queue.recv() {
                Ok(job) => job,
                Err(_) => break,
            }
        };
        if cancel.is_cancelled() {
            // Queued jobs are skipped once the batch is cancelled.
            let _ = results.send(Err(CoreError::Interrupted));
            continue;
        }
        let _ = results.send(job());
    }
}
