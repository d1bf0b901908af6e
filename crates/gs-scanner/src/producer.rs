//! The queue producer that walks a scanner's patterns.

use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8PathBuf;
use gs_queue::{Producer, QueueSink, Step};
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::walker::DirectoryWalker;

/// Walks one pattern per step.
///
/// Patterns are claimed from a shared cursor, so with several driver threads
/// each pattern is still walked exactly once. A driver that finds no pattern
/// left waits for offloaded subtrees before reporting [`Step::Done`].
#[derive(Debug)]
pub struct ScanProducer {
    patterns: Vec<String>,
    cursor: AtomicUsize,
    walker: DirectoryWalker,
}

impl ScanProducer {
    /// Creates a producer over `patterns`.
    #[must_use]
    pub fn new(patterns: Vec<String>, walker: DirectoryWalker) -> Self {
        Self {
            patterns,
            cursor: AtomicUsize::new(0),
            walker,
        }
    }

    /// The walker shared by every step.
    #[inline]
    #[must_use]
    pub const fn walker(&self) -> &DirectoryWalker {
        &self.walker
    }

    fn wait_for_subtrees(&self) {
        let pending = self.walker.in_flight();
        if pending > 0 {
            debug!(in_flight = pending, "Waiting for offloaded subtrees");
        }
        self.walker.wait_idle();
    }
}

impl Producer<Utf8PathBuf> for ScanProducer {
    type Error = ScanError;

    fn step(&self, sink: &QueueSink<Utf8PathBuf>) -> Result<Step, ScanError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let Some(pattern) = self.patterns.get(index) else {
            self.wait_for_subtrees();
            return Ok(Step::Done);
        };

        self.walker.stats().record_pattern();
        debug!(
            pattern = %pattern,
            index,
            total = self.patterns.len(),
            "Walking pattern"
        );

        match self.walker.walk_pattern(pattern, sink) {
            Ok(()) => Ok(Step::Continue),
            Err(ScanError::Cancelled) => {
                debug!(pattern = %pattern, "Scan cancelled");
                self.wait_for_subtrees();
                Ok(Step::Done)
            }
            Err(e) if e.is_recoverable() => {
                warn!(pattern = %pattern, error = %e, "Skipping pattern");
                self.walker.stats().record_pattern_skipped();
                Ok(Step::Continue)
            }
            Err(e) => Err(e),
        }
    }
}
