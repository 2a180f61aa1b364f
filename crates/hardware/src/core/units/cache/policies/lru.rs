//! Least Recently Used (LRU) Replacement Policy.
//!
//! Each way carries the value of a per-cache access counter taken at its last use.
//! The victim is the way with the smallest stamp.
//!
//! # Performance
//!
//! - **Time Complexity:** `update()` O(1), `get_victim()` O(W)
//! - **Space Complexity:** O(S × W)

use super::ReplacementPolicy;

/// LRU Policy state.
#[derive(Debug)]
pub struct LruPolicy {
    ways: usize,
    /// Last-use stamp per (set, way), row-major by set.
    stamps: Vec<u64>,
    clock: u64,
}

impl LruPolicy {
    /// Creates a new LRU policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            ways,
            stamps: vec![0; sets * ways],
            clock: 0,
        }
    }

    fn touch(&mut self, set: usize, way: usize) {
        self.clock += 1;
        self.stamps[set * self.ways + way] = self.clock;
    }
}

impl ReplacementPolicy for LruPolicy {
    fn update(&mut self, set: usize, way: usize) {
        self.touch(set, way);
    }

    fn fill(&mut self, set: usize, way: usize) {
        self.touch(set, way);
    }

    fn get_victim(&mut self, set: usize) -> usize {
        let row = &self.stamps[set * self.ways..(set + 1) * self.ways];
        row.iter()
            .enumerate()
            .min_by_key(|&(_, stamp)| *stamp)
            .map_or(0, |(way, _)| way)
    }
}
