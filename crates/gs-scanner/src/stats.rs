//! Walk statistics with atomic counters.
//!
//! [`WalkStats`] is shared by every thread taking part in a scan;
//! [`WalkStatsSnapshot`] is a serializable point-in-time copy.
//!
//! Counters use [`Relaxed`](std::sync::atomic::Ordering::Relaxed) ordering.
//! They are informational and never drive control flow.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for one scan.
///
/// # Examples
///
/// ```
/// use gs_scanner::WalkStats;
///
/// let stats = WalkStats::new();
/// stats.record_pattern();
/// stats.record_match();
///
/// let snap = stats.snapshot();
/// assert_eq!(snap.patterns, 1);
/// assert_eq!(snap.files_matched, 1);
/// ```
#[derive(Debug, Default)]
pub struct WalkStats {
    patterns: AtomicU64,
    patterns_skipped: AtomicU64,
    directories_listed: AtomicU64,
    files_matched: AtomicU64,
    files_filtered: AtomicU64,
    subtrees_offloaded: AtomicU64,
    subtrees_inline: AtomicU64,
    io_errors: AtomicU64,
}

impl WalkStats {
    /// Creates a new [`WalkStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A pattern was claimed for walking.
    #[inline]
    pub fn record_pattern(&self) {
        self.patterns.fetch_add(1, Ordering::Relaxed);
    }

    /// A pattern was skipped as invalid or unwalkable.
    #[inline]
    pub fn record_pattern_skipped(&self) {
        self.patterns_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A directory was listed.
    #[inline]
    pub fn record_directory(&self) {
        self.directories_listed.fetch_add(1, Ordering::Relaxed);
    }

    /// A matching file was reported.
    #[inline]
    pub fn record_match(&self) {
        self.files_matched.fetch_add(1, Ordering::Relaxed);
    }

    /// A matching file was dropped by the result filter.
    #[inline]
    pub fn record_filtered(&self) {
        self.files_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// A subtree was submitted to the worker pool.
    #[inline]
    pub fn record_offloaded(&self) {
        self.subtrees_offloaded.fetch_add(1, Ordering::Relaxed);
    }

    /// A subtree was walked on the current thread.
    #[inline]
    pub fn record_inline(&self) {
        self.subtrees_inline.fetch_add(1, Ordering::Relaxed);
    }

    /// A directory listing or entry lookup failed.
    #[inline]
    pub fn record_io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> WalkStatsSnapshot {
        WalkStatsSnapshot {
            patterns: self.patterns.load(Ordering::Relaxed),
            patterns_skipped: self.patterns_skipped.load(Ordering::Relaxed),
            directories_listed: self.directories_listed.load(Ordering::Relaxed),
            files_matched: self.files_matched.load(Ordering::Relaxed),
            files_filtered: self.files_filtered.load(Ordering::Relaxed),
            subtrees_offloaded: self.subtrees_offloaded.load(Ordering::Relaxed),
            subtrees_inline: self.subtrees_inline.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`WalkStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalkStatsSnapshot {
    /// Patterns claimed for walking.
    pub patterns: u64,
    /// Patterns skipped as invalid or unwalkable.
    pub patterns_skipped: u64,
    /// Directories listed.
    pub directories_listed: u64,
    /// Files reported.
    pub files_matched: u64,
    /// Matching files dropped by the result filter.
    pub files_filtered: u64,
    /// Subtrees submitted to the worker pool.
    pub subtrees_offloaded: u64,
    /// Subtrees walked inline.
    pub subtrees_inline: u64,
    /// Failed directory listings or entry lookups.
    pub io_errors: u64,
}

impl WalkStatsSnapshot {
    /// Fraction of descended subtrees that went to the pool, in percent.
    ///
    /// Returns `0.0` when nothing was descended.
    ///
    /// # Examples
    ///
    /// ```
    /// use gs_scanner::WalkStatsSnapshot;
    ///
    /// let snap = WalkStatsSnapshot {
    ///     subtrees_offloaded: 3,
    ///     subtrees_inline: 1,
    ///     ..Default::default()
    /// };
    /// assert!((snap.offload_percent() - 75.0).abs() < 0.1);
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Acceptable for statistics display
    pub fn offload_percent(&self) -> f64 {
        let total = self.subtrees_offloaded + self.subtrees_inline;
        if total == 0 {
            return 0.0;
        }
        (self.subtrees_offloaded as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = WalkStats::new();
        stats.record_pattern();
        stats.record_pattern();
        stats.record_pattern_skipped();
        stats.record_directory();
        stats.record_match();
        stats.record_filtered();
        stats.record_offloaded();
        stats.record_inline();
        stats.record_io_error();

        let snap = stats.snapshot();
        assert_eq!(snap.patterns, 2);
        assert_eq!(snap.patterns_skipped, 1);
        assert_eq!(snap.directories_listed, 1);
        assert_eq!(snap.files_matched, 1);
        assert_eq!(snap.files_filtered, 1);
        assert_eq!(snap.subtrees_offloaded, 1);
        assert_eq!(snap.subtrees_inline, 1);
        assert_eq!(snap.io_errors, 1);
    }

    #[test]
    fn test_offload_percent_empty() {
        assert!(WalkStatsSnapshot::default().offload_percent().abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snap = WalkStatsSnapshot {
            patterns: 3,
            files_matched: 12,
            ..Default::default()
        };
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: WalkStatsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, parsed);
    }
}
