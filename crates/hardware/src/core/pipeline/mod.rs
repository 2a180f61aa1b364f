//! Per-thread instruction pipeline state.
//!
//! Each hardware thread owns one [`ThreadPipeline`]:
//! 1. **Fetch:** Fetch buffer, next-PC logic and branch prediction.
//! 2. **Decode:** Latch between decode and dispatch (out-of-order only).
//! 3. **ROB:** Dispatched instructions until commit.
//! 4. **Store Buffer:** Committed stores until the data cache accepts them.
//!
//! Stage sequencing across threads lives in [`Core`](crate::core::Core).

/// Fetch-group formation and prediction.
pub mod fetch;

/// Reorder buffer.
pub mod rob;

/// Post-commit store buffer.
pub mod store_buffer;

use std::collections::VecDeque;

pub use self::fetch::FetchUnit;
pub use self::rob::{DynInst, InstState, Operand, Rob, StoreSearch};
pub use self::store_buffer::{StoreBuffer, StoreEntry};

use crate::config::CoreConfig;
use crate::core::units::bru::BranchPredictorWrapper;

/// Speculative state of one hardware thread.
#[derive(Clone, Debug)]
pub struct ThreadPipeline {
    /// Fetch unit and fetch buffer.
    pub fetch: FetchUnit,
    /// Decoded instructions waiting for dispatch.
    pub decoded: VecDeque<DynInst>,
    decode_capacity: usize,
    /// Reorder buffer.
    pub rob: Rob,
    /// Committed stores.
    pub store_buffer: StoreBuffer,
    /// Direction predictor (private to the thread).
    pub predictor: BranchPredictorWrapper,
    /// Next sequence number.
    pub next_seq: u64,
}

impl ThreadPipeline {
    /// Creates an empty pipeline sized by `config`.
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            fetch: FetchUnit::new(config.fetch_width),
            decoded: VecDeque::with_capacity(2 * config.dispatch_width),
            decode_capacity: 2 * config.dispatch_width,
            rob: Rob::new(config.rob_entries),
            store_buffer: StoreBuffer::new(config.store_buffer_entries),
            predictor: BranchPredictorWrapper::new(config),
            next_seq: 0,
        }
    }

    /// Returns true if the decode latch has room.
    pub fn can_decode(&self) -> bool {
        self.decoded.len() < self.decode_capacity
    }

    /// Allocates a sequence number.
    pub const fn alloc_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Squashes everything younger than `seq` and restarts fetch at `pc`.
    ///
    /// # Returns
    ///
    /// The number of instructions discarded.
    pub fn squash_after(&mut self, seq: u64, pc: u64) -> usize {
        let removed = self.rob.flush_after(seq) + self.decoded.len();
        self.decoded.clear();
        removed + self.fetch.redirect(pc)
    }

    /// Squashes every in-flight instruction and restarts fetch at `pc`.
    pub fn flush_to(&mut self, pc: u64) -> usize {
        let removed = self.rob.flush_all() + self.decoded.len();
        self.decoded.clear();
        removed + self.fetch.redirect(pc)
    }

    /// Squashes every in-flight instruction and stops fetching.
    pub fn shut_down(&mut self) -> usize {
        let removed = self.rob.flush_all() + self.decoded.len();
        self.decoded.clear();
        removed + self.fetch.stop()
    }
}
