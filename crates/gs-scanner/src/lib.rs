//! Concurrent wildcard filesystem scanner.
//!
//! Given patterns like `logs/**/*.gz` or `data/2024-??/*.csv`, this crate
//! enumerates every matching file, either inline on the caller's thread or
//! on background producer threads that fan subtrees out to a worker pool.
//! Results are pulled one at a time, with backpressure.
//!
//! # Overview
//!
//! - [`DirectoryScanner`]: the entry point; holds patterns and options
//! - [`Scan`]: one running scan, an [`Iterator`] over matched paths
//! - [`PatternResolver`]: splits a pattern into a literal root and matchers
//! - [`DirectoryWalker`]: walks a resolved pattern, offloading subtrees
//! - [`ResultFilter`]: drops excluded extensions and control characters
//! - [`WalkStats`]: atomic walk counters
//!
//! # Example
//!
//! ```no_run
//! use gs_scanner::DirectoryScanner;
//!
//! let scanner = DirectoryScanner::new()
//!     .with_patterns(["src/**/*.rs", "Cargo.toml"])
//!     .with_async(true)
//!     .with_pool_concurrency(4);
//!
//! for path in scanner.scan()? {
//!     println!("{path}");
//! }
//! # Ok::<(), gs_scanner::ScanError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! DirectoryScanner
//!     │ scan()
//!     ▼
//! Scan ── AsyncIterationQueue<Utf8PathBuf, ScanProducer>
//!             │
//!             └── ScanProducer (one pattern per step)
//!                     │
//!                     └── DirectoryWalker
//!                             ├── PatternResolver → CompiledPattern
//!                             ├── WorkerPool (offloaded ScanTasks)
//!                             ├── InFlight (completion gate)
//!                             └── ResultFilter
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod error;
mod filter;
mod glob;
mod in_flight;
mod pattern;
mod producer;
mod stats;
mod walker;

pub use error::ScanError;
pub use filter::ResultFilter;
pub use glob::{RECURSIVE_MARKER, compile_recursive, compile_segment, is_wildcard, segment_to_regex};
pub use in_flight::{InFlight, InFlightGuard};
pub use pattern::{CompiledPattern, PatternResolver, ResolvedPattern};
pub use producer::ScanProducer;
pub use stats::{WalkStats, WalkStatsSnapshot};
pub use walker::{DirectoryWalker, ScanTask, TaskMode, WalkerConfig};

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use gs_core::{ExtensionSet, ScanOptions};
use gs_queue::{
    AsyncIterationQueue, PoolStatsSnapshot, QueueConfig, QueueHandle, QueueStatsSnapshot,
    WorkerPool,
};
use tracing::info;

/// Name prefix of the worker pool threads.
const POOL_NAME: &str = "gs-walk";

/// Scanner configuration: a pattern list plus [`ScanOptions`].
///
/// # Examples
///
/// ```
/// use gs_scanner::DirectoryScanner;
///
/// let mut scanner = DirectoryScanner::new().with_queue_limit(256);
/// scanner.set_patterns(["*.txt"]);
/// scanner.set_async(true);
/// assert!(scanner.is_async());
/// assert_eq!(scanner.patterns(), ["*.txt"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    patterns: Vec<String>,
    options: ScanOptions,
}

impl DirectoryScanner {
    /// Creates a scanner with default options and no patterns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scanner with the given options and no patterns.
    #[must_use]
    pub fn from_options(options: ScanOptions) -> Self {
        Self {
            patterns: Vec::new(),
            options,
        }
    }

    /// Replaces the pattern list.
    pub fn set_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
    }

    /// Sets the pattern list.
    #[must_use]
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_patterns(patterns);
        self
    }

    /// Switches between inline and background production.
    pub fn set_async(&mut self, asynchronous: bool) {
        self.options.asynchronous = asynchronous;
    }

    /// Returns `true` if scans run on background producer threads.
    #[inline]
    #[must_use]
    pub const fn is_async(&self) -> bool {
        self.options.asynchronous
    }

    /// Sets inline or background production.
    #[must_use]
    pub const fn with_async(mut self, asynchronous: bool) -> Self {
        self.options.asynchronous = asynchronous;
        self
    }

    /// Sets the number of producer threads for asynchronous scans.
    #[must_use]
    pub const fn with_producer_threads(mut self, threads: usize) -> Self {
        self.options.producer_threads = threads;
        self
    }

    /// Sets the worker pool size. `0` walks every subtree inline.
    #[must_use]
    pub const fn with_pool_concurrency(mut self, concurrency: usize) -> Self {
        self.options.pool_concurrency = concurrency;
        self
    }

    /// Sets the queue limit (`0` = unbounded).
    #[must_use]
    pub const fn with_queue_limit(mut self, limit: usize) -> Self {
        self.options.queue_limit = limit;
        self
    }

    /// Sets how long a blocked producer waits between rechecks.
    #[must_use]
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.options.queue_poll_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enables randomized dequeue.
    #[must_use]
    pub const fn with_randomize(mut self, randomize: bool) -> Self {
        self.options.randomize = randomize;
        self
    }

    /// Starts scans paused.
    #[must_use]
    pub const fn with_paused(mut self, paused: bool) -> Self {
        self.options.paused = paused;
        self
    }

    /// Sets the extensions that are never reported.
    #[must_use]
    pub fn with_excluded_extensions(mut self, extensions: ExtensionSet) -> Self {
        self.options.excluded_extensions = extensions;
        self
    }

    /// Drops files whose name contains a control character.
    #[must_use]
    pub const fn with_reject_control_chars(mut self, reject: bool) -> Self {
        self.options.reject_control_chars = reject;
        self
    }

    /// Sorts each directory's children before matching.
    #[must_use]
    pub const fn with_sort_children(mut self, sort: bool) -> Self {
        self.options.sort_children = sort;
        self
    }

    /// Descends into symbolically linked directories.
    #[must_use]
    pub const fn with_follow_links(mut self, follow: bool) -> Self {
        self.options.follow_links = follow;
        self
    }

    /// The pattern list.
    #[inline]
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// The scan options.
    #[inline]
    #[must_use]
    pub const fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Prepares a scan. Nothing is walked until the first pull.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Config`] if the options are invalid, or
    /// [`ScanError::Pool`] if the worker pool can't be started.
    pub fn scan(&self) -> Result<Scan, ScanError> {
        let options = &self.options;
        options.validate()?;

        // Offloading only pays off when the walk runs off the consumer's thread.
        let pool = if options.asynchronous && options.pool_concurrency > 0 {
            Some(WorkerPool::new(POOL_NAME, options.pool_concurrency)?)
        } else {
            None
        };

        let stats = Arc::new(WalkStats::new());
        let walker = DirectoryWalker::new(
            WalkerConfig {
                filter: ResultFilter::new()
                    .with_excluded_extensions(options.excluded_extensions.clone())
                    .with_reject_control_chars(options.reject_control_chars),
                sort_children: options.sort_children,
                follow_links: options.follow_links,
            },
            pool,
            Arc::clone(&stats),
        );

        let config = QueueConfig {
            asynchronous: options.asynchronous,
            producer_threads: options.producer_threads,
            queue_limit: options.queue_limit,
            poll_delay: Duration::from_millis(options.queue_poll_delay_ms),
            randomize: options.randomize,
            paused: options.paused,
        };

        info!(
            patterns = self.patterns.len(),
            asynchronous = options.asynchronous,
            producer_threads = options.producer_threads,
            pool_concurrency = options.pool_concurrency,
            "Prepared scan"
        );

        Ok(Scan {
            queue: AsyncIterationQueue::new(
                config,
                ScanProducer::new(self.patterns.clone(), walker),
            ),
            stats,
        })
    }

    /// Runs a scan to completion and returns every matched path.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`scan`](Self::scan), or a queue error if
    /// producer threads can't be started.
    pub fn included_files(&self) -> Result<Vec<Utf8PathBuf>, ScanError> {
        self.scan()?.collect_all()
    }
}

/// One scan in progress.
///
/// Iterating pulls matched paths until the walk and every offloaded subtree
/// are done. Dropping a scan interrupts its producers.
#[derive(Debug)]
pub struct Scan {
    queue: AsyncIterationQueue<Utf8PathBuf, ScanProducer>,
    stats: Arc<WalkStats>,
}

impl Scan {
    /// Returns whether another path is available, waiting as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Queue`] if producer threads can't be started.
    pub fn has_next(&self) -> Result<bool, ScanError> {
        Ok(self.queue.has_next()?)
    }

    /// Removes and returns the next path.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Queue`] if nothing is queued.
    pub fn next_path(&self) -> Result<Utf8PathBuf, ScanError> {
        Ok(self.queue.next_item()?)
    }

    /// Starts background production without pulling.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Queue`] for a synchronous scan or a second start.
    pub fn start_async(&self) -> Result<(), ScanError> {
        Ok(self.queue.start_async()?)
    }

    /// Drains every remaining path.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Queue`] if producer threads can't be started.
    pub fn collect_all(&self) -> Result<Vec<Utf8PathBuf>, ScanError> {
        Ok(self.queue.collect_all()?)
    }

    /// Requests cooperative cancellation.
    pub fn interrupt(&self) {
        self.queue.interrupt();
    }

    /// Pauses or resumes producers.
    pub fn set_paused(&self, paused: bool) {
        self.queue.set_paused(paused);
    }

    /// Changes the queue limit.
    pub fn set_queue_limit(&self, limit: usize) {
        self.queue.set_queue_limit(limit);
    }

    /// Changes the producer poll delay.
    pub fn set_poll_delay(&self, delay: Duration) {
        self.queue.set_poll_delay(delay);
    }

    /// Enables or disables randomized dequeue.
    pub fn set_randomize(&self, randomize: bool) {
        self.queue.set_randomize(randomize);
    }

    /// A handle for interrupting or pausing from another thread.
    #[must_use]
    pub fn handle(&self) -> QueueHandle<Utf8PathBuf> {
        self.queue.handle()
    }

    /// Returns `true` once production has finished.
    #[must_use]
    pub fn has_finished(&self) -> bool {
        self.queue.has_finished()
    }

    /// Queue state.
    #[must_use]
    pub fn queue_stats(&self) -> QueueStatsSnapshot {
        self.queue.stats()
    }

    /// Walk counters.
    #[must_use]
    pub fn walk_stats(&self) -> WalkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Worker pool counters, if this scan offloads subtrees.
    #[must_use]
    pub fn pool_stats(&self) -> Option<PoolStatsSnapshot> {
        self.queue.producer().walker().pool().map(WorkerPool::stats)
    }

    /// Offloaded subtrees still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.queue.producer().walker().in_flight()
    }
}

impl Iterator for Scan {
    type Item = Utf8PathBuf;

    fn next(&mut self) -> Option<Utf8PathBuf> {
        self.queue.iter().next()
    }
}
