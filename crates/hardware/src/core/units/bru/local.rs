//! Local History Branch Predictor.
//!
//! A two-level predictor in the style of the Alpha 21264 local component:
//! 1. **History Table:** Indexed by branch address, each entry holds the last
//!    `history_bits` outcomes of the branches that map to it.
//! 2. **Counter Table:** Indexed by that history, each entry is a two-bit saturating
//!    counter; values 2 and 3 predict taken.

use super::BranchPredictor;
use crate::isa::INST_BYTES;

/// Counter value that starts every entry weakly not-taken.
const WEAKLY_NOT_TAKEN: u8 = 1;

/// Local history predictor state.
#[derive(Clone, Debug)]
pub struct LocalPredictor {
    histories: Vec<u16>,
    counters: Vec<u8>,
    history_mask: u16,
}

impl LocalPredictor {
    /// Creates a local predictor.
    ///
    /// # Arguments
    ///
    /// * `entries` - History table entries (power of two).
    /// * `history_bits` - History length; the counter table has `2^history_bits` entries.
    pub fn new(entries: usize, history_bits: u32) -> Self {
        let bits = history_bits.clamp(1, 16);
        Self {
            histories: vec![0; entries.max(1).next_power_of_two()],
            counters: vec![WEAKLY_NOT_TAKEN; 1 << bits],
            history_mask: u16::MAX >> (16 - bits),
        }
    }

    #[inline]
    fn history_index(&self, pc: u64) -> usize {
        ((pc / INST_BYTES) as usize) & (self.histories.len() - 1)
    }
}

impl BranchPredictor for LocalPredictor {
    fn predict(&self, pc: u64) -> Option<bool> {
        let history = self.histories[self.history_index(pc)];
        Some(self.counters[history as usize] >= 2)
    }

    fn update(&mut self, pc: u64, taken: bool) {
        let idx = self.history_index(pc);
        let history = self.histories[idx];
        let counter = &mut self.counters[history as usize];
        *counter = if taken {
            (*counter + 1).min(3)
        } else {
            counter.saturating_sub(1)
        };
        self.histories[idx] = ((history << 1) | u16::from(taken)) & self.history_mask;
    }
}
