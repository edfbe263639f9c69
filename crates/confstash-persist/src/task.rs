//! A small fixed-size worker pool and the `chunks` helper.
//!
//! [`TaskQueue`] starts `n_workers` threads that pull boxed jobs from a
//! shared channel. Results are collected in completion order and returned
//! by [`TaskQueue::stop`], which closes the channel and joins the workers.
//!
//! ```rust
//! # use confstash_persist::TaskQueue;
//! let mut queue = TaskQueue::new(4);
//! for i in 1..=10_u64 {
//!     queue.add_task(move || Ok(i * i)).unwrap();
//! }
//! let results = queue.stop().unwrap();
//! assert_eq!(results.iter().sum::<u64>(), 385);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{PersistError, PersistResult};

/// A unit of work for the queue.
pub type Job<R> = Box<dyn FnOnce() -> PersistResult<R> + Send>;

/// Lifecycle of a [`TaskQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskQueueState {
    Running,
    Stopped,
}

// ═══════════════════════════════════════════════════════════════════════
//  TaskQueue
// ═══════════════════════════════════════════════════════════════════════

/// Fixed pool of worker threads consuming jobs in submission order.
pub struct TaskQueue<R> {
    n_workers: usize,
    sender: Option<Sender<Job<R>>>,
    workers: Vec<JoinHandle<()>>,
    results: Arc<Mutex<Vec<R>>>,
    failures: Arc<Mutex<Vec<PersistError>>>,
    started_at: DateTime<Utc>,
    stopped_at: Option<DateTime<Utc>>,
}

impl<R: Send + 'static> TaskQueue<R> {
    /// Start `n_workers` threads (at least one).
    pub fn new(n_workers: usize) -> Self {
        let n_workers = n_workers.max(1);
        let (sender, receiver) = channel::unbounded::<Job<R>>();
        let results = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(Mutex::new(Vec::new()));

        let workers = (0..n_workers)
            .map(|id| {
                let receiver = receiver.clone();
                let results = Arc::clone(&results);
                let failures = Arc::clone(&failures);
                std::thread::spawn(move || run_worker(id, receiver, results, failures))
            })
            .collect();

        debug!(n_workers, "task queue started");
        Self {
            n_workers,
            sender: Some(sender),
            workers,
            results,
            failures,
            started_at: Utc::now(),
            stopped_at: None,
        }
    }

    /// Queue `task` for execution by the next free worker.
    pub fn add_task<F>(&self, task: F) -> PersistResult<()>
    where
        F: FnOnce() -> PersistResult<R> + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| PersistError::InvalidArgument("task queue is stopped".to_string()))?;
        sender
            .send(Box::new(task))
            .map_err(|_| PersistError::TaskFailed("all workers have exited".to_string()))
    }

    /// Wait for every queued task, stop the workers and return the results
    /// in completion order.
    ///
    /// If any task failed, the first failure is returned instead.
    pub fn stop(&mut self) -> PersistResult<Vec<R>> {
        self.shutdown();

        let mut failures = self
            .failures
            .lock()
            .map_err(|e| PersistError::Poisoned(format!("task failures: {e}")))?;
        if !failures.is_empty() {
            warn!(count = failures.len(), "tasks failed");
            return Err(failures.remove(0));
        }
        let mut results = self
            .results
            .lock()
            .map_err(|e| PersistError::Poisoned(format!("task results: {e}")))?;
        Ok(std::mem::take(&mut *results))
    }

    fn shutdown(&mut self) {
        // Dropping the sender lets workers drain the channel and exit.
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                if let Ok(mut failures) = self.failures.lock() {
                    failures.push(PersistError::TaskFailed("worker thread panicked".to_string()));
                }
            }
        }
        self.stopped_at = Some(Utc::now());
        debug!(n_workers = self.n_workers, "task queue stopped");
    }
}

impl<R> TaskQueue<R> {
    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    pub fn state(&self) -> TaskQueueState {
        if self.stopped_at.is_some() {
            TaskQueueState::Stopped
        } else {
            TaskQueueState::Running
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall time from start to stop; `None` while running.
    pub fn time_elapsed(&self) -> Option<Duration> {
        self.stopped_at
            .and_then(|stopped| (stopped - self.started_at).to_std().ok())
    }
}

fn run_worker<R>(
    id: usize,
    receiver: Receiver<Job<R>>,
    results: Arc<Mutex<Vec<R>>>,
    failures: Arc<Mutex<Vec<PersistError>>>,
) {
    debug!(worker = id, "worker started");
    for job in receiver.iter() {
        match job() {
            Ok(result) => {
                if let Ok(mut results) = results.lock() {
                    results.push(result);
                }
            }
            Err(e) => {
                warn!(worker = id, error = %e, "task failed");
                if let Ok(mut failures) = failures.lock() {
                    failures.push(e);
                }
            }
        }
    }
    debug!(worker = id, "worker finished");
}

impl<R> Drop for TaskQueue<R> {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<R> fmt::Display for TaskQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.stopped_at.unwrap_or_else(Utc::now);
        let secs = (end - self.started_at).num_microseconds().unwrap_or(0) as f64 / 1e6;
        match self.state() {
            TaskQueueState::Running => write!(f, "tasks processing in {secs:.6}s: running"),
            TaskQueueState::Stopped => write!(f, "tasks processed in {secs:.6}s: finished"),
        }
    }
}

impl<R> fmt::Debug for TaskQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("n_workers", &self.n_workers)
            .field("state", &self.state())
            .field("started_at", &self.started_at)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  chunks
// ═══════════════════════════════════════════════════════════════════════

/// Iterator over consecutive groups of at most `size` items.
#[derive(Debug, Clone)]
pub struct Chunks<I> {
    iter: I,
    size: usize,
}

/// Split `iter` into vectors of at most `n` items; the last may be shorter.
/// A size of zero is treated as one.
pub fn chunks<I: IntoIterator>(iter: I, n: usize) -> Chunks<I::IntoIter> {
    Chunks {
        iter: iter.into_iter(),
        size: n.max(1),
    }
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<_> = self.iter.by_ref().take(self.size).collect();
        if chunk.is_empty() { None } else { Some(chunk) }
    }
}

// ── tests ────────────────────────────────────────────────────────────
