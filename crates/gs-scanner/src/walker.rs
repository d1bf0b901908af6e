//! Recursive descent over compiled patterns.
//!
//! [`DirectoryWalker`] walks one pattern at a time. Each directory visit is
//! described by a [`ScanTask`]; the walker either runs a task on the current
//! thread or, when the worker pool has room, submits it to the pool.
//!
//! # Modes
//!
//! - [`TaskMode::Segment`]: list the directory, match entry names against
//!   one segment, descend into matching directories with the next segment
//! - [`TaskMode::Recursive`]: descend into every directory and test every
//!   file's path, relative to where `**` started, against one matcher
//!
//! # Termination
//!
//! Offloaded tasks are tracked by [`InFlight`]. A task registers its children
//! before it completes, so [`DirectoryWalker::wait_idle`] returns only once
//! the whole fan-out is done.
//!
//! # Links
//!
//! With `follow_links` set, every visited directory is recorded by its
//! canonical path. A directory reached a second time through another path
//! is skipped, so each physical file is reported at most once per scan.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use gs_queue::{QueueSink, WorkerPool};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::error::ScanError;
use crate::filter::ResultFilter;
use crate::in_flight::InFlight;
use crate::pattern::{CompiledPattern, PatternResolver, ResolvedPattern};
use crate::stats::WalkStats;

/// How a [`ScanTask`] matches the entries of its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskMode {
    /// Match entry names against the segment at the task's index.
    Segment,
    /// Match file paths below the `**` directory against the recursive matcher.
    Recursive {
        /// This directory's path relative to the `**` directory, with a
        /// leading `/` (empty at the `**` directory itself).
        relative: String,
    },
}

/// One directory to visit. Immutable; passed by value to the pool.
#[derive(Debug, Clone)]
pub struct ScanTask {
    /// Absolute directory path.
    pub dir: Utf8PathBuf,
    /// The pattern being walked.
    pub pattern: Arc<CompiledPattern>,
    /// Segment index for [`TaskMode::Segment`].
    pub index: usize,
    /// Matching mode.
    pub mode: TaskMode,
}

impl ScanTask {
    /// Creates the task for a pattern's root directory.
    #[must_use]
    pub fn root(pattern: Arc<CompiledPattern>, dir: Utf8PathBuf) -> Self {
        Self::at(pattern, dir, 0)
    }

    /// Segment index past the per-level matchers switches to recursive mode.
    fn at(pattern: Arc<CompiledPattern>, dir: Utf8PathBuf, index: usize) -> Self {
        let mode = if index >= pattern.segment_count() && pattern.recursive().is_some() {
            TaskMode::Recursive {
                relative: String::new(),
            }
        } else {
            TaskMode::Segment
        };
        Self {
            dir,
            pattern,
            index,
            mode,
        }
    }

    fn next_segment(&self, dir: Utf8PathBuf) -> Self {
        Self::at(Arc::clone(&self.pattern), dir, self.index + 1)
    }

    fn nested(&self, dir: Utf8PathBuf, relative: String) -> Self {
        Self {
            dir,
            pattern: Arc::clone(&self.pattern),
            index: self.index,
            mode: TaskMode::Recursive { relative },
        }
    }
}

/// Options for a [`DirectoryWalker`].
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Filter applied to every match.
    pub filter: ResultFilter,
    /// Sort each directory's children by path before matching.
    pub sort_children: bool,
    /// Descend into symbolically linked directories.
    pub follow_links: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
    /// A symlinked directory that isn't followed.
    LinkedDirectory,
}

#[derive(Debug)]
struct Entry {
    path: Utf8PathBuf,
    name: String,
    kind: EntryKind,
}

/// Identity of one directory visit: pattern source, segment index
/// (`usize::MAX` in recursive mode) and canonical directory.
type VisitKey = (Arc<str>, usize, PathBuf);

#[derive(Debug)]
struct WalkContext {
    config: WalkerConfig,
    resolver: PatternResolver,
    pool: Option<WorkerPool>,
    in_flight: Arc<InFlight>,
    stats: Arc<WalkStats>,
    /// Only populated when following links.
    visited: Mutex<FxHashSet<VisitKey>>,
}

/// Walks patterns, pushing matching paths into a queue sink.
///
/// Cheap to clone; clones share the pool, the in-flight tracker and the
/// statistics.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use gs_queue::{AsyncIterationQueue, Producer, QueueConfig, QueueSink, Step};
/// use gs_scanner::{DirectoryWalker, ScanError, WalkStats, WalkerConfig};
/// # use camino::Utf8PathBuf;
///
/// struct One(DirectoryWalker);
///
/// impl Producer<Utf8PathBuf> for One {
///     type Error = ScanError;
///     fn step(&self, sink: &QueueSink<Utf8PathBuf>) -> Result<Step, ScanError> {
///         self.0.walk_pattern("src/**/*.rs", sink)?;
///         Ok(Step::Done)
///     }
/// }
///
/// let walker = DirectoryWalker::new(WalkerConfig::default(), None, Arc::new(WalkStats::new()));
/// let queue = AsyncIterationQueue::new(QueueConfig::synchronous(), One(walker));
/// for path in &queue {
///     println!("{path}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    inner: Arc<WalkContext>,
}

impl DirectoryWalker {
    /// Creates a walker. Without a pool every subtree is walked inline.
    #[must_use]
    pub fn new(config: WalkerConfig, pool: Option<WorkerPool>, stats: Arc<WalkStats>) -> Self {
        Self {
            inner: Arc::new(WalkContext {
                config,
                resolver: PatternResolver::new(),
                pool,
                in_flight: Arc::new(InFlight::new()),
                stats,
                visited: Mutex::new(FxHashSet::default()),
            }),
        }
    }

    /// The worker pool, if offloading is enabled.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.inner.pool.as_ref()
    }

    /// Walk statistics.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &WalkStats {
        &self.inner.stats
    }

    /// Number of offloaded subtrees still running.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.count()
    }

    /// Blocks until every offloaded subtree has finished.
    pub fn wait_idle(&self) {
        self.inner.in_flight.wait_idle();
    }

    /// Resolves and walks one pattern.
    ///
    /// Offloaded subtrees may still be running when this returns; use
    /// [`wait_idle`](Self::wait_idle) to wait for them.
    ///
    /// # Errors
    ///
    /// - [`ScanError::InvalidPattern`] if the pattern can't be compiled
    /// - [`ScanError::NotADirectory`] if its literal root is a file
    /// - [`ScanError::ReadDir`] if its literal root can't be inspected
    /// - [`ScanError::Cancelled`] if the queue was interrupted
    ///
    /// A root that doesn't exist is not an error; the pattern matches nothing.
    pub fn walk_pattern(
        &self,
        pattern: &str,
        sink: &QueueSink<Utf8PathBuf>,
    ) -> Result<(), ScanError> {
        match self.inner.resolver.resolve(pattern)? {
            ResolvedPattern::Literal(path) => self.walk_literal(&path, sink),
            ResolvedPattern::Wildcard(compiled) => {
                let root = compiled.root();
                match fs::metadata(root) {
                    Ok(meta) if meta.is_dir() => {}
                    Ok(_) => return Err(ScanError::NotADirectory(root.to_owned())),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!(pattern = %compiled.source(), root = %root, "Root does not exist");
                        return Ok(());
                    }
                    Err(e) => return Err(ScanError::read_dir(root, e)),
                }
                let root = absolute(root)?;
                debug!(pattern = %compiled.source(), root = %root, "Walking from root");
                self.run(ScanTask::root(Arc::new(compiled), root), sink)
            }
        }
    }

    /// Runs one task on the current thread.
    ///
    /// Listing failures are logged and skip the directory. Only
    /// cancellation is returned as an error.
    pub fn run(&self, task: ScanTask, sink: &QueueSink<Utf8PathBuf>) -> Result<(), ScanError> {
        if sink.is_interrupted() {
            return Err(ScanError::Cancelled);
        }
        if self.inner.config.follow_links && !self.first_visit(&task) {
            trace!(dir = %task.dir, "Directory already visited through another path");
            return Ok(());
        }

        let entries = match self.list(&task.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %task.dir, error = %e, "Skipping unreadable directory");
                self.inner.stats.record_io_error();
                return Ok(());
            }
        };

        match &task.mode {
            TaskMode::Segment => self.match_segment(&task, entries, sink),
            TaskMode::Recursive { relative } => self.match_recursive(&task, relative, entries, sink),
        }
    }

    /// Records the task's directory and returns `false` if the same pattern
    /// already visited it at the same depth.
    fn first_visit(&self, task: &ScanTask) -> bool {
        // Unresolvable directories fail in `list` and are reported there.
        let Ok(canonical) = fs::canonicalize(&task.dir) else {
            return true;
        };
        let depth = match task.mode {
            TaskMode::Segment => task.index,
            TaskMode::Recursive { .. } => usize::MAX,
        };
        let key = (Arc::from(task.pattern.source()), depth, canonical);
        self.inner.visited.lock().insert(key)
    }

    fn walk_literal(&self, path: &Utf8Path, sink: &QueueSink<Utf8PathBuf>) -> Result<(), ScanError> {
        if !path.exists() {
            debug!(path = %path, "Literal path does not exist");
            return Ok(());
        }
        let path = absolute(path)?;
        debug!(path = %path, "Found fully-resolved path");
        self.emit(path, sink)
    }

    fn match_segment(
        &self,
        task: &ScanTask,
        entries: Vec<Entry>,
        sink: &QueueSink<Utf8PathBuf>,
    ) -> Result<(), ScanError> {
        let Some(matcher) = task.pattern.segment(task.index) else {
            return Ok(());
        };
        let last = task.pattern.is_last(task.index);

        for entry in entries {
            if sink.is_interrupted() {
                return Err(ScanError::Cancelled);
            }
            if !matcher.is_match(&entry.name) {
                continue;
            }
            match (entry.kind, last) {
                (EntryKind::Directory, false) => {
                    self.dispatch(task.next_segment(entry.path), sink)?;
                }
                (EntryKind::File, true) => self.emit(entry.path, sink)?,
                (EntryKind::Directory | EntryKind::LinkedDirectory, true) => {
                    trace!(path = %entry.path, "Matched directory at last segment");
                }
                (EntryKind::LinkedDirectory, false) => {
                    trace!(path = %entry.path, "Not following linked directory");
                }
                (EntryKind::File, false) => {
                    trace!(path = %entry.path, "Matched file before last segment");
                }
            }
        }
        Ok(())
    }

    fn match_recursive(
        &self,
        task: &ScanTask,
        relative: &str,
        entries: Vec<Entry>,
        sink: &QueueSink<Utf8PathBuf>,
    ) -> Result<(), ScanError> {
        let Some(matcher) = task.pattern.recursive() else {
            return Ok(());
        };

        for entry in entries {
            if sink.is_interrupted() {
                return Err(ScanError::Cancelled);
            }
            let current = format!("{relative}/{}", entry.name);
            match entry.kind {
                EntryKind::Directory => self.dispatch(task.nested(entry.path, current), sink)?,
                EntryKind::LinkedDirectory => {
                    trace!(path = %entry.path, "Not following linked directory");
                }
                EntryKind::File if matcher.is_match(&current) => self.emit(entry.path, sink)?,
                EntryKind::File => {}
            }
        }
        Ok(())
    }

    /// Offloads `task` when the pool has room, otherwise runs it inline.
    fn dispatch(&self, task: ScanTask, sink: &QueueSink<Utf8PathBuf>) -> Result<(), ScanError> {
        if let Some(pool) = &self.inner.pool {
            if pool.load() < pool.concurrency().saturating_mul(2) {
                let guard = self.inner.in_flight.track();
                self.inner.stats.record_offloaded();
                let walker = self.clone();
                let sink = sink.clone();
                pool.submit(move || {
                    let _guard = guard;
                    if let Err(e) = walker.run(task, &sink) {
                        debug!(error = %e, "Offloaded subtree stopped");
                    }
                });
                return Ok(());
            }
        }
        self.inner.stats.record_inline();
        self.run(task, sink)
    }

    fn emit(&self, path: Utf8PathBuf, sink: &QueueSink<Utf8PathBuf>) -> Result<(), ScanError> {
        if !self.inner.config.filter.accepts(&path) {
            trace!(path = %path, "Filtered out");
            self.inner.stats.record_filtered();
            return Ok(());
        }
        sink.push(path)?;
        self.inner.stats.record_match();
        Ok(())
    }

    /// Lists a directory. Entries that can't be inspected are logged and
    /// dropped.
    fn list(&self, dir: &Utf8Path) -> Result<Vec<Entry>, ScanError> {
        let read = fs::read_dir(dir).map_err(|e| ScanError::read_dir(dir, e))?;
        self.inner.stats.record_directory();

        let mut entries = Vec::new();
        for entry in read {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir, error = %e, "Failed to read directory entry");
                    self.inner.stats.record_io_error();
                    continue;
                }
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => {
                    let err = ScanError::NonUtf8Path(entry.path());
                    warn!(error = %err, "Skipping entry");
                    continue;
                }
            };
            let path = dir.join(&name);
            match self.classify(&entry, &path) {
                Ok(kind) => entries.push(Entry { path, name, kind }),
                Err(e) => {
                    warn!(error = %e, "Skipping entry");
                    self.inner.stats.record_io_error();
                }
            }
        }

        if self.inner.config.sort_children {
            entries.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        }
        Ok(entries)
    }

    fn classify(&self, entry: &fs::DirEntry, path: &Utf8Path) -> Result<EntryKind, ScanError> {
        let file_type = entry
            .file_type()
            .map_err(|e| ScanError::read_dir(path, e))?;
        if file_type.is_dir() {
            return Ok(EntryKind::Directory);
        }
        if !file_type.is_symlink() {
            return Ok(EntryKind::File);
        }

        // Broken links resolve to nothing and are reported as files.
        let points_to_dir = fs::metadata(path).is_ok_and(|meta| meta.is_dir());
        if !points_to_dir {
            return Ok(EntryKind::File);
        }
        if !self.inner.config.follow_links {
            return Ok(EntryKind::LinkedDirectory);
        }
        if is_link_cycle(path) {
            warn!(path = %path, "Not following link back to an ancestor");
            return Ok(EntryKind::LinkedDirectory);
        }
        Ok(EntryKind::Directory)
    }
}

/// Returns `true` if the link at `path` resolves to one of its own
/// ancestors, as reached through the walk.
fn is_link_cycle(path: &Utf8Path) -> bool {
    let Ok(target) = fs::canonicalize(path) else {
        return false;
    };
    path.ancestors()
        .skip(1)
        .any(|ancestor| fs::canonicalize(ancestor).is_ok_and(|resolved| resolved == target))
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, ScanError> {
    let absolute = std::path::absolute(path).map_err(|e| ScanError::read_dir(path, e))?;
    Utf8PathBuf::from_path_buf(absolute).map_err(ScanError::NonUtf8Path)
}
