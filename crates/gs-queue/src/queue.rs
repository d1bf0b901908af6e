//! Bounded producer/consumer queue with a pull-iteration protocol.
//!
//! An [`AsyncIterationQueue`] owns a [`Producer`] and hands out its results
//! one at a time through [`has_next`](AsyncIterationQueue::has_next) /
//! [`next_item`](AsyncIterationQueue::next_item), or as a plain
//! [`Iterator`].
//!
//! # Modes
//!
//! - **Synchronous**: `has_next()` drives [`Producer::step`] inline on the
//!   consumer's thread until an item appears or the producer is done.
//! - **Asynchronous**: the first `has_next()` spawns `producer_threads`
//!   driver threads that call `step()` in a loop. Consumers block until an
//!   item is queued or every driver has exited.
//!
//! # Handshake
//!
//! One mutex guards the items, the `finished` flag and the counters. The
//! `available` condition variable is signalled once per pushed item and
//! broadcast when production finishes, so a woken consumer always observes
//! either an item or completion. Producers blocked on backpressure or pause
//! wait on `space` with a timeout of the configured poll delay, which bounds
//! how long an interrupt or an unpause goes unnoticed.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::QueueError;
use crate::pool::panic_message;
use crate::rng::XorShift64;
use crate::stats::QueueStatsSnapshot;

/// Queue depth above which randomized dequeue picks a random index.
pub const RANDOMIZE_MIN_DEPTH: usize = 10;

/// Default producer poll delay when blocked.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(100);

/// Result of one [`Producer::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work may remain; call `step()` again.
    Continue,
    /// This producer has nothing left to do.
    Done,
}

/// A source of items for an [`AsyncIterationQueue`].
///
/// `step()` performs one unit of production, pushing any results into the
/// sink. In asynchronous mode it may be called concurrently from several
/// driver threads, so implementations coordinate shared work themselves.
pub trait Producer<T>: Send + Sync + 'static {
    /// Error reported by a failed step. Logged by the queue; a failed step
    /// ends that driver.
    type Error: std::fmt::Display + Send + 'static;

    /// Performs one unit of production.
    ///
    /// # Errors
    ///
    /// Returns an error when production cannot continue on this driver.
    fn step(&self, sink: &QueueSink<T>) -> Result<Step, Self::Error>;
}

/// Configuration for an [`AsyncIterationQueue`].
///
/// # Examples
///
/// ```
/// use gs_queue::QueueConfig;
///
/// let config = QueueConfig::asynchronous(2).with_queue_limit(64);
/// assert!(config.asynchronous);
/// assert_eq!(config.producer_threads, 2);
/// assert_eq!(config.queue_limit, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Run the producer on background driver threads.
    pub asynchronous: bool,
    /// Number of driver threads in asynchronous mode (at least 1).
    pub producer_threads: usize,
    /// Maximum queued items before producers block (`0` = unbounded).
    /// Only enforced in asynchronous mode.
    pub queue_limit: usize,
    /// Recheck interval for blocked producers.
    pub poll_delay: Duration,
    /// Dequeue from a random index when more than ten items are queued.
    pub randomize: bool,
    /// Start with producers paused.
    pub paused: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            asynchronous: false,
            producer_threads: 1,
            queue_limit: 0,
            poll_delay: DEFAULT_POLL_DELAY,
            randomize: false,
            paused: false,
        }
    }
}

impl QueueConfig {
    /// Creates a synchronous configuration.
    #[must_use]
    pub fn synchronous() -> Self {
        Self::default()
    }

    /// Creates an asynchronous configuration with `producer_threads` drivers.
    #[must_use]
    pub fn asynchronous(producer_threads: usize) -> Self {
        Self {
            asynchronous: true,
            producer_threads: producer_threads.max(1),
            ..Self::default()
        }
    }

    /// Sets the queue limit (`0` = unbounded).
    #[must_use]
    pub const fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    /// Sets the producer poll delay.
    #[must_use]
    pub const fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Enables or disables randomized dequeue.
    #[must_use]
    pub const fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Starts the queue paused or running.
    #[must_use]
    pub const fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }
}

/// Mutable state, guarded by [`Shared::state`].
#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    scan_started: bool,
    finished: bool,
    paused: bool,
    queue_limit: usize,
    poll_delay: Duration,
    randomize: bool,
    live_drivers: usize,
    total_produced: u64,
    total_consumed: u64,
    rng: XorShift64,
}

#[derive(Debug)]
struct Shared<T> {
    asynchronous: bool,
    producer_threads: usize,
    state: Mutex<State<T>>,
    /// Signalled when an item is queued or production finishes.
    available: Condvar,
    /// Signalled when room frees up, on unpause, and on interrupt.
    space: Condvar,
    interrupted: AtomicBool,
}

impl<T> Shared<T> {
    fn new(config: QueueConfig) -> Self {
        Self {
            asynchronous: config.asynchronous,
            producer_threads: config.producer_threads.max(1),
            state: Mutex::new(State {
                items: VecDeque::new(),
                scan_started: false,
                finished: false,
                paused: config.paused,
                queue_limit: config.queue_limit,
                poll_delay: config.poll_delay,
                randomize: config.randomize,
                live_drivers: 0,
                total_produced: 0,
                total_consumed: 0,
                rng: XorShift64::from_entropy(),
            }),
            available: Condvar::new(),
            space: Condvar::new(),
            interrupted: AtomicBool::new(false),
        }
    }

    fn push(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(QueueError::Interrupted);
            }
            let limited = self.asynchronous
                && state.queue_limit > 0
                && state.items.len() >= state.queue_limit;
            if !state.paused && !limited {
                break;
            }
            let delay = state.poll_delay;
            self.space.wait_for(&mut state, delay);
        }

        state.items.push_back(item);
        state.total_produced += 1;
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        if !state.finished {
            debug!(produced = state.total_produced, "Production finished");
        }
        state.finished = true;
        drop(state);
        self.available.notify_all();
    }

    /// Called by each driver thread on exit; the last one out finishes.
    fn driver_exited(&self) {
        let mut state = self.state.lock();
        state.live_drivers = state.live_drivers.saturating_sub(1);
        let last = state.live_drivers == 0;
        drop(state);
        if last {
            self.finish();
        }
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        let _state = self.state.lock();
        self.space.notify_all();
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        state.paused = paused;
        drop(state);
        if !paused {
            self.space.notify_all();
        }
    }

    fn set_queue_limit(&self, limit: usize) {
        self.state.lock().queue_limit = limit;
        self.space.notify_all();
    }

    fn set_poll_delay(&self, delay: Duration) {
        self.state.lock().poll_delay = delay;
    }

    fn set_randomize(&self, randomize: bool) {
        self.state.lock().randomize = randomize;
    }

    fn stats(&self) -> QueueStatsSnapshot {
        let state = self.state.lock();
        QueueStatsSnapshot {
            asynchronous: self.asynchronous,
            randomize: state.randomize,
            paused: state.paused,
            finished: state.finished,
            queue_len: state.items.len(),
            queue_limit: state.queue_limit,
            poll_delay_ms: u64::try_from(state.poll_delay.as_millis()).unwrap_or(u64::MAX),
            total_produced: state.total_produced,
            total_consumed: state.total_consumed,
        }
    }
}

/// Producer-side handle: pushes items and observes cancellation.
///
/// Cheap to clone; clones share the same queue.
#[derive(Debug)]
pub struct QueueSink<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueSink<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> QueueSink<T> {
    /// Appends an item, blocking while paused or while an asynchronous
    /// queue is at its limit.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Interrupted`] if the queue was interrupted,
    /// either before the call or while it was blocked.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        self.shared.push(item)
    }

    /// Marks production as finished and wakes every waiting consumer.
    pub fn finish(&self) {
        self.shared.finish();
    }

    /// Returns `true` once [`interrupt`](QueueHandle::interrupt) was called.
    #[inline]
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.shared.is_interrupted()
    }

    /// Current number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Control handle usable from any thread while iteration is in progress.
#[derive(Debug)]
pub struct QueueHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> QueueHandle<T> {
    /// Requests cooperative cancellation. One-way.
    pub fn interrupt(&self) {
        self.shared.interrupt();
    }

    /// Pauses or resumes producers.
    pub fn set_paused(&self, paused: bool) {
        self.shared.set_paused(paused);
    }

    /// Returns a snapshot of the queue state.
    #[must_use]
    pub fn stats(&self) -> QueueStatsSnapshot {
        self.shared.stats()
    }
}

/// A bounded queue fed by a [`Producer`] and drained by pull iteration.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use gs_queue::{AsyncIterationQueue, Producer, QueueConfig, QueueSink, Step};
///
/// struct Countdown(AtomicU32);
///
/// impl Producer<u32> for Countdown {
///     type Error = gs_queue::QueueError;
///
///     fn step(&self, sink: &QueueSink<u32>) -> Result<Step, Self::Error> {
///         match self.0.fetch_sub(1, Ordering::SeqCst) {
///             0 => Ok(Step::Done),
///             n => sink.push(n).map(|()| Step::Continue),
///         }
///     }
/// }
///
/// let queue = AsyncIterationQueue::new(QueueConfig::asynchronous(1), Countdown(AtomicU32::new(3)));
/// let mut items: Vec<u32> = queue.iter().collect();
/// items.sort_unstable();
/// assert_eq!(items, vec![1, 2, 3]);
/// ```
pub struct AsyncIterationQueue<T, P> {
    shared: Arc<Shared<T>>,
    producer: Arc<P>,
    drivers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T, P> AsyncIterationQueue<T, P>
where
    T: Send + 'static,
    P: Producer<T>,
{
    /// Creates a queue around `producer`. Nothing runs until the first
    /// [`has_next`](Self::has_next) (or [`start_async`](Self::start_async)).
    pub fn new(config: QueueConfig, producer: P) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
            producer: Arc::new(producer),
            drivers: Mutex::new(Vec::new()),
        }
    }

    /// Returns `true` in asynchronous mode.
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.shared.asynchronous
    }

    /// Returns the producer.
    #[inline]
    #[must_use]
    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Returns whether an item is available, waiting or producing as needed.
    ///
    /// After this returns `Ok(true)`, the next [`next_item`](Self::next_item)
    /// from the same (single) consumer succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Spawn`] if asynchronous driver threads can't be
    /// started.
    pub fn has_next(&self) -> Result<bool, QueueError> {
        if self.shared.asynchronous {
            self.ensure_started()?;
            let mut state = self.shared.state.lock();
            while state.items.is_empty() && !state.finished {
                self.shared.available.wait(&mut state);
            }
            return Ok(!state.items.is_empty());
        }

        loop {
            {
                let state = self.shared.state.lock();
                if !state.items.is_empty() {
                    return Ok(true);
                }
                if state.finished {
                    return Ok(false);
                }
            }
            if self.shared.is_interrupted() {
                debug!("Synchronous production interrupted");
                self.shared.finish();
                continue;
            }
            self.run_inline_step();
        }
    }

    /// Removes and returns one item.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::EmptyQueue`] if nothing is queued.
    pub fn next_item(&self) -> Result<T, QueueError> {
        let mut state = self.shared.state.lock();
        let len = state.items.len();
        if len == 0 {
            return Err(QueueError::EmptyQueue);
        }
        let index = if state.randomize && len > RANDOMIZE_MIN_DEPTH {
            state.rng.below(len)
        } else {
            0
        };
        let item = state
            .items
            .remove(index)
            .ok_or(QueueError::EmptyQueue)?;
        state.total_consumed += 1;
        drop(state);
        self.shared.space.notify_one();
        Ok(item)
    }

    /// Spawns the driver threads.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotAsync`] on a synchronous queue,
    /// [`QueueError::AlreadyStarted`] on a second call, and
    /// [`QueueError::Spawn`] if a thread can't be created.
    pub fn start_async(&self) -> Result<(), QueueError> {
        if !self.shared.asynchronous {
            return Err(QueueError::NotAsync);
        }
        {
            let mut state = self.shared.state.lock();
            if state.scan_started {
                return Err(QueueError::AlreadyStarted);
            }
            state.scan_started = true;
            state.live_drivers = self.shared.producer_threads;
        }
        self.spawn_drivers()
    }

    /// Returns `true` once production has started.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.shared.state.lock().scan_started
    }

    /// Returns `true` once production has finished.
    #[must_use]
    pub fn has_finished(&self) -> bool {
        self.shared.state.lock().finished
    }

    /// Requests cooperative cancellation. One-way.
    pub fn interrupt(&self) {
        self.shared.interrupt();
    }

    /// Pauses or resumes producers. Takes effect at their next push.
    pub fn set_paused(&self, paused: bool) {
        self.shared.set_paused(paused);
    }

    /// Changes the queue limit on a live queue.
    pub fn set_queue_limit(&self, limit: usize) {
        self.shared.set_queue_limit(limit);
    }

    /// Changes the producer poll delay on a live queue.
    pub fn set_poll_delay(&self, delay: Duration) {
        self.shared.set_poll_delay(delay);
    }

    /// Enables or disables randomized dequeue on a live queue.
    pub fn set_randomize(&self, randomize: bool) {
        self.shared.set_randomize(randomize);
    }

    /// Current number of queued items.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Returns a snapshot of the queue state.
    #[must_use]
    pub fn stats(&self) -> QueueStatsSnapshot {
        self.shared.stats()
    }

    /// Returns a producer-side handle, for producers fed from outside.
    #[must_use]
    pub fn sink(&self) -> QueueSink<T> {
        QueueSink {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns a control handle for interrupting or pausing from another thread.
    #[must_use]
    pub fn handle(&self) -> QueueHandle<T> {
        QueueHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns a borrowing iterator over the remaining items.
    ///
    /// Errors from [`has_next`](Self::has_next) end the iteration and are
    /// logged.
    pub fn iter(&self) -> Iter<'_, T, P> {
        Iter { queue: self }
    }

    /// Drains every remaining item into a vector, in dequeue order.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`has_next`](Self::has_next) and
    /// [`next_item`](Self::next_item).
    pub fn collect_all(&self) -> Result<Vec<T>, QueueError> {
        let mut items = Vec::new();
        while self.has_next()? {
            items.push(self.next_item()?);
        }
        Ok(items)
    }

    fn ensure_started(&self) -> Result<(), QueueError> {
        match self.start_async() {
            Ok(()) | Err(QueueError::AlreadyStarted) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn spawn_drivers(&self) -> Result<(), QueueError> {
        let count = self.shared.producer_threads;
        let mut drivers = self.drivers.lock();

        for index in 0..count {
            let shared = Arc::clone(&self.shared);
            let producer = Arc::clone(&self.producer);
            let spawned = thread::Builder::new()
                .name(format!("gs-producer-{index}"))
                .spawn(move || drive(producer.as_ref(), &QueueSink { shared }));

            match spawned {
                Ok(handle) => drivers.push(handle),
                Err(source) => {
                    // Account for this thread and every one not yet spawned.
                    for _ in index..count {
                        self.shared.driver_exited();
                    }
                    error!(error = %source, index, "Failed to spawn producer thread");
                    return Err(QueueError::Spawn(source));
                }
            }
        }

        info!(threads = count, "Started asynchronous production");
        Ok(())
    }

    fn run_inline_step(&self) {
        let sink = self.sink();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.producer.step(&sink)));
        match outcome {
            Ok(Ok(Step::Continue)) => {}
            Ok(Ok(Step::Done)) => self.shared.finish(),
            Ok(Err(e)) => {
                warn!(error = %e, "Producer step failed");
                self.shared.finish();
            }
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "Producer step panicked");
                self.shared.finish();
            }
        }
    }
}

impl<T, P> Drop for AsyncIterationQueue<T, P> {
    fn drop(&mut self) {
        // Detached drivers stop at their next push or step boundary.
        self.shared.interrupt();
    }
}

impl<T, P> std::fmt::Debug for AsyncIterationQueue<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncIterationQueue")
            .field("asynchronous", &self.shared.asynchronous)
            .field("producer_threads", &self.shared.producer_threads)
            .field("interrupted", &self.shared.is_interrupted())
            .finish_non_exhaustive()
    }
}

/// Driver thread body: step until done, failed, or interrupted.
fn drive<T, P: Producer<T>>(producer: &P, sink: &QueueSink<T>) {
    let thread_name = thread::current().name().unwrap_or("gs-producer").to_owned();
    debug!(thread = %thread_name, "Producer thread started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        while !sink.is_interrupted() {
            match producer.step(sink) {
                Ok(Step::Continue) => {}
                Ok(Step::Done) => break,
                Err(e) => {
                    error!(thread = %thread_name, error = %e, "Producer failed");
                    break;
                }
            }
        }
    }));
    if let Err(payload) = outcome {
        error!(
            thread = %thread_name,
            panic = panic_message(payload.as_ref()),
            "Producer thread panicked"
        );
    }

    debug!(thread = %thread_name, "Producer thread finished");
    sink.shared.driver_exited();
}

/// Borrowing iterator returned by [`AsyncIterationQueue::iter`].
#[derive(Debug)]
pub struct Iter<'a, T, P> {
    queue: &'a AsyncIterationQueue<T, P>,
}

impl<T, P> Iterator for Iter<'_, T, P>
where
    T: Send + 'static,
    P: Producer<T>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.queue.has_next() {
            Ok(true) => match self.queue.next_item() {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(error = %e, "Queue drained by another consumer");
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                error!(error = %e, "Iteration stopped");
                None
            }
        }
    }
}

impl<'a, T, P> IntoIterator for &'a AsyncIterationQueue<T, P>
where
    T: Send + 'static,
    P: Producer<T>,
{
    type Item = T;
    type IntoIter = Iter<'a, T, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize};
    use std::time::Instant;

    /// Pushes `remaining` numbers, one per step.
    struct Counter {
        remaining: AtomicU32,
    }

    impl Counter {
        fn new(count: u32) -> Self {
            Self {
                remaining: AtomicU32::new(count),
            }
        }
    }

    impl Producer<u32> for Counter {
        type Error = QueueError;

        fn step(&self, sink: &QueueSink<u32>) -> Result<Step, QueueError> {
            let previous = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            match previous {
                Ok(n) => sink.push(n - 1).map(|()| Step::Continue),
                Err(_) => Ok(Step::Done),
            }
        }
    }

    /// Pushes everything in a single step, tracking the peak queue length.
    struct Burst {
        count: u32,
        peak: AtomicUsize,
    }

    impl Producer<u32> for Burst {
        type Error = QueueError;

        fn step(&self, sink: &QueueSink<u32>) -> Result<Step, QueueError> {
            for n in 0..self.count {
                sink.push(n)?;
                self.peak.fetch_max(sink.len(), Ordering::SeqCst);
            }
            Ok(Step::Done)
        }
    }

    struct Failing;

    impl Producer<u32> for Failing {
        type Error = String;

        fn step(&self, sink: &QueueSink<u32>) -> Result<Step, String> {
            sink.push(7).map_err(|e| e.to_string())?;
            Err("disk on fire".to_owned())
        }
    }

    struct Panicking;

    impl Producer<u32> for Panicking {
        type Error = QueueError;

        #[allow(clippy::panic)]
        fn step(&self, _sink: &QueueSink<u32>) -> Result<Step, QueueError> {
            panic!("producer bug");
        }
    }

    fn sorted(mut items: Vec<u32>) -> Vec<u32> {
        items.sort_unstable();
        items
    }

    #[test]
    fn test_synchronous_iteration() {
        let queue = AsyncIterationQueue::new(QueueConfig::synchronous(), Counter::new(5));
        let items: Vec<u32> = queue.iter().collect();
        assert_eq!(items, vec![4, 3, 2, 1, 0]);
        assert!(queue.has_finished());
        assert!(!queue.has_started());
        assert!(!queue.has_next().unwrap());
    }

    #[test]
    fn test_asynchronous_iteration() {
        let queue = AsyncIterationQueue::new(QueueConfig::asynchronous(1), Counter::new(100));
        let items = queue.collect_all().unwrap();
        assert_eq!(sorted(items), (0..100).collect::<Vec<_>>());
        assert!(queue.has_started());
        assert!(queue.has_finished());
    }

    #[test]
    fn test_multiple_drivers_share_work() {
        let queue = AsyncIterationQueue::new(QueueConfig::asynchronous(4), Counter::new(500));
        let items = queue.collect_all().unwrap();
        assert_eq!(sorted(items), (0..500).collect::<Vec<_>>());
        let stats = queue.stats();
        assert_eq!(stats.total_produced, 500);
        assert_eq!(stats.total_consumed, 500);
    }

    #[test]
    fn test_next_without_item_is_error() {
        let queue = AsyncIterationQueue::new(QueueConfig::synchronous(), Counter::new(0));
        assert!(matches!(queue.next_item(), Err(QueueError::EmptyQueue)));
    }

    #[test]
    fn test_start_twice_is_error() {
        let queue = AsyncIterationQueue::new(QueueConfig::asynchronous(1), Counter::new(3));
        queue.start_async().unwrap();
        assert!(matches!(
            queue.start_async(),
            Err(QueueError::AlreadyStarted)
        ));
        // has_next() after an explicit start is still fine.
        assert_eq!(queue.iter().count(), 3);
    }

    #[test]
    fn test_start_on_sync_queue_is_error() {
        let queue = AsyncIterationQueue::new(QueueConfig::synchronous(), Counter::new(3));
        assert!(matches!(queue.start_async(), Err(QueueError::NotAsync)));
    }

    #[test]
    fn test_finished_is_observed_repeatedly() {
        let queue = AsyncIterationQueue::new(QueueConfig::asynchronous(2), Counter::new(0));
        assert!(!queue.has_next().unwrap());
        assert!(!queue.has_next().unwrap());
        assert!(queue.has_finished());
    }

    #[test]
    fn test_backpressure_bounds_queue_length() {
        let config = QueueConfig::asynchronous(1)
            .with_queue_limit(4)
            .with_poll_delay(Duration::from_millis(1));
        let queue = AsyncIterationQueue::new(
            config,
            Burst {
                count: 200,
                peak: AtomicUsize::new(0),
            },
        );

        let mut count = 0;
        while queue.has_next().unwrap() {
            assert!(queue.queue_len() <= 4);
            queue.next_item().unwrap();
            count += 1;
        }
        assert_eq!(count, 200);
        assert!(queue.producer().peak.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn test_pause_blocks_until_resumed() {
        let config = QueueConfig::asynchronous(1)
            .with_paused(true)
            .with_poll_delay(Duration::from_millis(5));
        let queue = AsyncIterationQueue::new(config, Counter::new(3));
        queue.start_async().unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.queue_len(), 0);
        assert!(queue.stats().paused);

        queue.set_paused(false);
        assert_eq!(queue.iter().count(), 3);
    }

    #[test]
    fn test_interrupt_fails_blocked_push() {
        let config = QueueConfig::asynchronous(1)
            .with_queue_limit(1)
            .with_poll_delay(Duration::from_millis(5));
        let queue = AsyncIterationQueue::new(
            config,
            Burst {
                count: 10,
                peak: AtomicUsize::new(0),
            },
        );
        queue.start_async().unwrap();

        // Wait for the producer to fill the single slot and block.
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.queue_len() < 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        queue.interrupt();

        // The driver exits with an Interrupted error and finishes the queue.
        let drained = queue.iter().count();
        assert!(drained < 10);
        assert!(queue.has_finished());
    }

    #[test]
    fn test_handle_interrupts_from_other_thread() {
        let config = QueueConfig::asynchronous(1)
            .with_paused(true)
            .with_poll_delay(Duration::from_millis(5));
        let queue = AsyncIterationQueue::new(config, Counter::new(1000));
        let handle = queue.handle();

        let interrupter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.interrupt();
        });

        assert_eq!(queue.iter().count(), 0);
        interrupter.join().unwrap();
    }

    #[test]
    fn test_randomized_dequeue_returns_everything() {
        let queue = AsyncIterationQueue::new(
            QueueConfig::synchronous().with_randomize(true),
            Burst {
                count: 50,
                peak: AtomicUsize::new(0),
            },
        );
        let items: Vec<u32> = queue.iter().collect();
        assert_eq!(items.len(), 50);
        assert_eq!(sorted(items), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_small_queue_stays_fifo_when_randomized() {
        let queue = AsyncIterationQueue::new(
            QueueConfig::synchronous().with_randomize(true),
            Burst {
                count: 10,
                peak: AtomicUsize::new(0),
            },
        );
        let items: Vec<u32> = queue.iter().collect();
        assert_eq!(items, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_failing_producer_still_finishes() {
        let queue = AsyncIterationQueue::new(QueueConfig::asynchronous(1), Failing);
        assert_eq!(queue.collect_all().unwrap(), vec![7]);

        let queue = AsyncIterationQueue::new(QueueConfig::synchronous(), Failing);
        assert_eq!(queue.collect_all().unwrap(), vec![7]);
    }

    #[test]
    fn test_panicking_producer_still_finishes() {
        let queue = AsyncIterationQueue::new(QueueConfig::asynchronous(2), Panicking);
        assert!(!queue.has_next().unwrap());

        let queue = AsyncIterationQueue::new(QueueConfig::synchronous(), Panicking);
        assert!(!queue.has_next().unwrap());
    }

    #[test]
    fn test_stats_snapshot() {
        let config = QueueConfig::synchronous()
            .with_queue_limit(16)
            .with_poll_delay(Duration::from_millis(25));
        let queue = AsyncIterationQueue::new(config, Counter::new(3));
        assert!(queue.has_next().unwrap());
        queue.next_item().unwrap();

        let stats = queue.stats();
        assert!(!stats.asynchronous);
        assert_eq!(stats.queue_limit, 16);
        assert_eq!(stats.poll_delay_ms, 25);
        assert_eq!(stats.total_produced, 1);
        assert_eq!(stats.total_consumed, 1);
        assert_eq!(stats.pending(), 0);
    }
}
