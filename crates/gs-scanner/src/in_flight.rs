//! Completion tracking for subtrees offloaded to the worker pool.
//!
//! Every offloaded subtree holds an [`InFlightGuard`] for as long as it runs.
//! A subtree that offloads children takes their guards before releasing its
//! own, so the count only reaches zero once the whole tree is done.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

/// Per-scan count of offloaded subtrees that haven't finished.
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    gate: Mutex<()>,
    idle: Condvar,
}

impl InFlight {
    /// Creates a tracker with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one subtree. The returned guard completes it on drop,
    /// including when the subtree panics.
    #[must_use]
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            in_flight: Arc::clone(self),
        }
    }

    /// Number of subtrees currently in flight.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Blocks until nothing is in flight.
    pub fn wait_idle(&self) {
        let mut gate = self.gate.lock();
        while self.count.load(Ordering::SeqCst) != 0 {
            self.idle.wait(&mut gate);
        }
    }

    fn complete(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Taking the gate orders this wakeup after a waiter's check.
            let _gate = self.gate.lock();
            self.idle.notify_all();
        }
    }
}

/// Marks one offloaded subtree as finished when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.complete();
    }
}
