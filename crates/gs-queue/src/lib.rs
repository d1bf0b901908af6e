//! Bounded producer/consumer iteration and a resilient worker pool.
//!
//! # Overview
//!
//! - [`AsyncIterationQueue`]: a queue driven by a [`Producer`], drained by pull
//!   iteration, with backpressure, pause, interrupt and randomized dequeue
//! - [`QueueSink`] / [`QueueHandle`]: producer-side and control-side handles
//! - [`WorkerPool`]: fixed-size rayon pool with load introspection; task
//!   panics are caught and logged
//!
//! # Architecture
//!
//! ```text
//! consumer thread                 driver threads (1..N)
//!     │ has_next() / next_item()      │ Producer::step(&sink)
//!     ▼                               ▼
//! ┌──────────── Mutex<State> ────────────┐
//! │ items (VecDeque) · finished · paused │
//! └───── available ◄──┬──► space ────────┘
//!                     │
//!              Condvar pair
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod error;
mod pool;
mod queue;
mod rng;
mod stats;

pub use error::{PoolError, QueueError};
pub use pool::WorkerPool;
pub use queue::{
    AsyncIterationQueue, DEFAULT_POLL_DELAY, Iter, Producer, QueueConfig, QueueHandle, QueueSink,
    RANDOMIZE_MIN_DEPTH, Step,
};
pub use stats::{PoolStatsSnapshot, QueueStatsSnapshot};
