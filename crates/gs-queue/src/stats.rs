//! Point-in-time views of queue and pool state.
//!
//! Both snapshots are plain copies, safe to store, serialize, and send
//! between threads.

use serde::{Deserialize, Serialize};

/// A snapshot of an [`AsyncIterationQueue`](crate::AsyncIterationQueue).
///
/// # Examples
///
/// ```
/// use gs_queue::QueueStatsSnapshot;
///
/// let snap = QueueStatsSnapshot {
///     total_produced: 10,
///     total_consumed: 7,
///     ..Default::default()
/// };
/// assert_eq!(snap.pending(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStatsSnapshot {
    /// Whether production runs on background threads.
    pub asynchronous: bool,
    /// Whether randomized dequeue is enabled.
    pub randomize: bool,
    /// Whether producers are currently paused.
    pub paused: bool,
    /// Whether production has finished.
    pub finished: bool,
    /// Items currently queued.
    pub queue_len: usize,
    /// Configured queue limit (`0` = unbounded).
    pub queue_limit: usize,
    /// Configured producer poll delay in milliseconds.
    pub poll_delay_ms: u64,
    /// Items added since creation.
    pub total_produced: u64,
    /// Items removed since creation.
    pub total_consumed: u64,
}

impl QueueStatsSnapshot {
    /// Items produced but not yet consumed.
    #[inline]
    #[must_use]
    pub const fn pending(&self) -> u64 {
        self.total_produced.saturating_sub(self.total_consumed)
    }
}

/// A snapshot of a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    /// Configured core concurrency.
    pub concurrency: usize,
    /// Tasks submitted but not yet started.
    pub queued: usize,
    /// Tasks currently running.
    pub active: usize,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks that panicked.
    pub failed: u64,
}

impl PoolStatsSnapshot {
    /// Queued plus active tasks.
    #[inline]
    #[must_use]
    pub const fn load(&self) -> usize {
        self.queued + self.active
    }
}
