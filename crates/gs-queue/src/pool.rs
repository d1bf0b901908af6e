//! Bounded worker pool with resilient task execution.
//!
//! [`WorkerPool`] wraps a fixed-size [`rayon::ThreadPool`] and adds the
//! bookkeeping rayon doesn't expose: how many submitted tasks are still
//! queued and how many are running. Callers use [`WorkerPool::load`] to
//! decide whether to offload more work or run it inline.
//!
//! A panicking task is caught, logged, and counted as failed; it never takes
//! down a pool thread or reaches the submitter.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{debug, error};

use crate::error::PoolError;
use crate::stats::PoolStatsSnapshot;

/// Counters shared between the pool handle and its running tasks.
#[derive(Debug, Default)]
struct PoolCounters {
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// A fixed-size pool of named worker threads.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use gs_queue::WorkerPool;
///
/// let pool = WorkerPool::new("example", 2)?;
/// let hits = Arc::new(AtomicUsize::new(0));
/// let (tx, rx) = std::sync::mpsc::channel();
/// for _ in 0..4 {
///     let hits = Arc::clone(&hits);
///     let tx = tx.clone();
///     pool.submit(move || {
///         hits.fetch_add(1, Ordering::SeqCst);
///         let _ = tx.send(());
///     });
/// }
/// for _ in 0..4 {
///     rx.recv()?;
/// }
/// assert_eq!(hits.load(Ordering::SeqCst), 4);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct WorkerPool {
    name: Arc<str>,
    concurrency: usize,
    max_task_count_before_overflow: usize,
    pool: rayon::ThreadPool,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Creates a pool with `concurrency` threads named `{name}-{index}`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroConcurrency`] if `concurrency` is zero, or
    /// [`PoolError::Build`] if the threads can't be started.
    pub fn new(name: &str, concurrency: usize) -> Result<Self, PoolError> {
        if concurrency == 0 {
            return Err(PoolError::ZeroConcurrency(name.to_owned()));
        }

        let thread_prefix = name.to_owned();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(move |index| format!("{thread_prefix}-{index}"))
            .build()
            .map_err(|source| PoolError::Build {
                name: name.to_owned(),
                source,
            })?;

        debug!(pool = name, concurrency, "Created worker pool");

        Ok(Self {
            name: Arc::from(name),
            concurrency,
            max_task_count_before_overflow: usize::MAX,
            pool,
            counters: Arc::new(PoolCounters::default()),
        })
    }

    /// Sets how many tasks beyond the core concurrency may be in the pool
    /// before [`is_overflowed`](Self::is_overflowed) reports `true`.
    #[must_use]
    pub const fn with_max_task_count_before_overflow(mut self, count: usize) -> Self {
        self.max_task_count_before_overflow = count;
        self
    }

    /// Submits a task for execution on a pool thread.
    ///
    /// The task is counted as queued until a thread picks it up. A panic
    /// inside the task is caught and logged.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        let counters = Arc::clone(&self.counters);
        let name = Arc::clone(&self.name);

        self.pool.spawn(move || {
            counters.queued.fetch_sub(1, Ordering::SeqCst);
            counters.active.fetch_add(1, Ordering::SeqCst);

            let outcome = panic::catch_unwind(AssertUnwindSafe(task));

            counters.active.fetch_sub(1, Ordering::SeqCst);
            match outcome {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        pool = %name,
                        panic = panic_message(payload.as_ref()),
                        "Task panicked in worker pool"
                    );
                }
            }
        });
    }

    /// Returns the pool name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured number of threads.
    #[inline]
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Tasks submitted but not yet started.
    #[inline]
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.counters.queued.load(Ordering::SeqCst)
    }

    /// Tasks currently running.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Queued plus running tasks.
    #[inline]
    #[must_use]
    pub fn load(&self) -> usize {
        self.queue_len() + self.active_count()
    }

    /// Returns `true` when the load exceeds the core concurrency plus the
    /// configured overflow allowance.
    #[must_use]
    pub fn is_overflowed(&self) -> bool {
        let current = self.load();
        let max = self
            .concurrency
            .saturating_add(self.max_task_count_before_overflow);
        let overflowed = current > max;
        debug!(
            pool = %self.name,
            queued = self.queue_len(),
            active = self.active_count(),
            max,
            overflowed,
            "Checked pool overflow"
        );
        overflowed
    }

    /// Returns a point-in-time snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            concurrency: self.concurrency,
            queued: self.queue_len(),
            active: self.active_count(),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("queued", &self.queue_len())
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(
            WorkerPool::new("zero", 0),
            Err(PoolError::ZeroConcurrency(_))
        ));
    }

    #[test]
    fn test_runs_submitted_tasks() {
        let pool = WorkerPool::new("runs", 2).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            pool.submit(move || {
                tx.send(i).unwrap();
            });
        }
        let mut seen: Vec<i32> = (0..8)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let pool = WorkerPool::new("panics", 1).unwrap();
        pool.submit(|| panic!("boom"));

        // The single thread must survive to run the next task.
        let (tx, rx) = mpsc::channel();
        pool.submit(move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // The failed counter is bumped after the panic is caught, which
        // happens before the next task starts on the single thread.
        assert_eq!(pool.stats().failed, 1);
    }

    #[test]
    fn test_load_tracks_blocked_tasks() {
        let pool = WorkerPool::new("load", 1).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();
        pool.submit(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.submit(|| {});

        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.queue_len(), 1);
        assert_eq!(pool.load(), 2);
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_is_overflowed() {
        let pool = WorkerPool::new("overflow", 1)
            .unwrap()
            .with_max_task_count_before_overflow(0);
        assert!(!pool.is_overflowed());

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();
        pool.submit(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.submit(|| {});

        assert!(pool.is_overflowed());
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
