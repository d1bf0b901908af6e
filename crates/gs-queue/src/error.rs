//! Error types for the gs-queue crate.

/// Errors returned by [`AsyncIterationQueue`](crate::AsyncIterationQueue)
/// and its producer-side [`QueueSink`](crate::QueueSink).
///
/// # Error Recovery Strategy
///
/// - **Usage errors** ([`QueueError::EmptyQueue`], [`QueueError::AlreadyStarted`],
///   [`QueueError::NotAsync`]): programming errors, never retried
/// - **Cancellation** ([`QueueError::Interrupted`]): surfaced to the blocked
///   producer, which should stop producing
/// - **Spawn failures** ([`QueueError::Spawn`]): the OS refused a producer thread
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// `next_item()` was called while nothing was queued.
    #[error("next_item() called on an empty queue; call has_next() first")]
    EmptyQueue,

    /// Asynchronous production was started more than once.
    #[error("asynchronous production already started")]
    AlreadyStarted,

    /// Asynchronous start was requested on a synchronous queue.
    #[error("queue is not asynchronous")]
    NotAsync,

    /// The queue was interrupted; producers stop at their next push.
    #[error("queue interrupted")]
    Interrupted,

    /// A producer thread could not be spawned.
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl QueueError {
    /// Returns `true` for errors caused by calling the API out of order.
    #[inline]
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyQueue | Self::AlreadyStarted | Self::NotAsync
        )
    }
}

/// Errors that can occur while building a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The requested concurrency was zero.
    #[error("worker pool '{0}' needs at least one thread")]
    ZeroConcurrency(String),

    /// The underlying thread pool failed to start.
    #[error("failed to build worker pool '{name}': {source}")]
    Build {
        /// Pool name.
        name: String,
        /// The rayon build error.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}
