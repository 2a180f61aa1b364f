//! Cache Replacement Policies.
//!
//! Implements victim selection for set-associative caches. Invalid ways are always
//! filled first by the cache; a policy is consulted only when the set is full.
//!
//! # Policies
//!
//! - `Lru`: Least Recently Used (default).
//! - `Fifo`: First-In, First-Out.
//! - `Random`: Seeded pseudo-random selection, reproducible across runs.

/// First-In, First-Out replacement policy.
pub mod fifo;

/// Least Recently Used replacement policy.
pub mod lru;

/// Random replacement policy.
pub mod random;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use random::RandomPolicy;

use crate::config::ReplacementPolicy as PolicyKind;

/// Trait for cache replacement policies.
pub trait ReplacementPolicy {
    /// Records a hit on `way` of `set`.
    fn update(&mut self, set: usize, way: usize);

    /// Records that a new line was installed in `way` of `set`.
    fn fill(&mut self, set: usize, way: usize);

    /// Selects the way of a full `set` to evict.
    ///
    /// # Returns
    ///
    /// The index of the way to evict.
    fn get_victim(&mut self, set: usize) -> usize;
}

/// Static-dispatch wrapper over the configured policy.
#[derive(Debug)]
pub enum Policy {
    /// Least Recently Used.
    Lru(LruPolicy),
    /// First-In, First-Out.
    Fifo(FifoPolicy),
    /// Seeded random.
    Random(RandomPolicy),
}

impl Policy {
    /// Builds the policy selected by `kind`.
    ///
    /// # Arguments
    ///
    /// * `kind` - Configured policy.
    /// * `sets` - Number of sets.
    /// * `ways` - Associativity.
    /// * `seed` - Seed for the random policy.
    pub fn new(kind: PolicyKind, sets: usize, ways: usize, seed: u64) -> Self {
        match kind {
            PolicyKind::Lru => Self::Lru(LruPolicy::new(sets, ways)),
            PolicyKind::Fifo => Self::Fifo(FifoPolicy::new(sets, ways)),
            PolicyKind::Random => Self::Random(RandomPolicy::new(ways, seed)),
        }
    }
}

impl ReplacementPolicy for Policy {
    #[inline]
    fn update(&mut self, set: usize, way: usize) {
        match self {
            Self::Lru(p) => p.update(set, way),
            Self::Fifo(p) => p.update(set, way),
            Self::Random(p) => p.update(set, way),
        }
    }

    #[inline]
    fn fill(&mut self, set: usize, way: usize) {
        match self {
            Self::Lru(p) => p.fill(set, way),
            Self::Fifo(p) => p.fill(set, way),
            Self::Random(p) => p.fill(set, way),
        }
    }

    #[inline]
    fn get_victim(&mut self, set: usize) -> usize {
        match self {
            Self::Lru(p) => p.get_victim(set),
            Self::Fifo(p) => p.get_victim(set),
            Self::Random(p) => p.get_victim(set),
        }
    }
}
