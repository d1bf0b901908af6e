//! Minimal xorshift64 generator for randomized dequeue.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// xorshift64 state. Never zero.
#[derive(Debug, Clone)]
pub(crate) struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Seeds from the process-random hasher keys.
    pub(crate) fn from_entropy() -> Self {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u64(0x9E37_79B9_7F4A_7C15);
        Self::with_seed(hasher.finish())
    }

    pub(crate) const fn with_seed(seed: u64) -> Self {
        Self { state: seed | 1 }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Returns a value in `0..bound`. `bound` must be non-zero.
    #[allow(clippy::cast_possible_truncation)] // Result is < bound, which is a usize
    pub(crate) fn below(&mut self, bound: usize) -> usize {
        // Multiply-shift keeps the bias negligible for queue-sized bounds.
        ((u128::from(self.next_u64()) * bound as u128) >> 64) as usize
    }
}
