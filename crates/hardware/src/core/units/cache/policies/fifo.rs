//! First-In, First-Out (FIFO) Replacement Policy.
//!
//! Evicts the line that was installed earliest, regardless of hits since.
//!
//! # Performance
//!
//! - **Time Complexity:** `update()` O(1), `get_victim()` O(W)
//! - **Space Complexity:** O(S × W)

use super::ReplacementPolicy;

/// FIFO Policy state.
#[derive(Debug)]
pub struct FifoPolicy {
    ways: usize,
    /// Install order per (set, way), row-major by set.
    installed: Vec<u64>,
    clock: u64,
}

impl FifoPolicy {
    /// Creates a new FIFO policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            ways,
            installed: vec![0; sets * ways],
            clock: 0,
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    /// Hits do not change install order.
    fn update(&mut self, _set: usize, _way: usize) {}

    fn fill(&mut self, set: usize, way: usize) {
        self.clock += 1;
        self.installed[set * self.ways + way] = self.clock;
    }

    fn get_victim(&mut self, set: usize) -> usize {
        let row = &self.installed[set * self.ways..(set + 1) * self.ways];
        row.iter()
            .enumerate()
            .min_by_key(|&(_, order)| *order)
            .map_or(0, |(way, _)| way)
    }
}
