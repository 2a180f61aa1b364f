//! Random Replacement Policy.
//!
//! Evicts a pseudo-random way, drawn from a xorshift generator seeded from the
//! configuration so that two runs with the same seed evict identically.

use super::ReplacementPolicy;

/// Random Policy state.
#[derive(Debug)]
pub struct RandomPolicy {
    ways: usize,
    state: u64,
}

impl RandomPolicy {
    /// Creates a new Random policy instance.
    ///
    /// # Arguments
    ///
    /// * `ways` - The associativity (number of ways) of the cache.
    /// * `seed` - Generator seed; zero is replaced by a fixed non-zero value.
    pub const fn new(ways: usize, seed: u64) -> Self {
        Self {
            ways,
            state: if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed },
        }
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn update(&mut self, _set: usize, _way: usize) {}

    fn fill(&mut self, _set: usize, _way: usize) {}

    fn get_victim(&mut self, _set: usize) -> usize {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x % self.ways as u64) as usize
    }
}
