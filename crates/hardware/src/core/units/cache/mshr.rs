//! Miss Status Holding Registers.
//!
//! One MSHR tracks one outstanding line fill (or one uncached access) together
//! with every request waiting on it. The table is bounded twice: by the number of
//! entries and by the number of targets an entry may merge. Exceeding either bound
//! refuses the request with backpressure; nothing is ever dropped.

use crate::common::{Backpressure, Packet, PacketId, Rejected};

/// One outstanding miss.
#[derive(Clone, Debug)]
pub struct Mshr {
    /// Line-aligned block address (exact address for uncached entries).
    pub block: u64,
    /// Identifier of the request sent to the mem side.
    pub fill: PacketId,
    /// Waiting requests, in arrival order.
    pub targets: Vec<Packet>,
    /// True if the access bypasses the array.
    pub uncached: bool,
    /// Cycle the miss was allocated.
    pub allocated_at: u64,
}

/// Bounded table of outstanding misses.
#[derive(Clone, Debug)]
pub struct MshrTable {
    entries: Vec<Mshr>,
    capacity: usize,
    max_targets: usize,
}

impl MshrTable {
    /// Creates a table.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum outstanding misses.
    /// * `max_targets` - Maximum requests merged into one miss.
    pub fn new(capacity: usize, max_targets: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            max_targets,
        }
    }

    /// Outstanding misses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no miss is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum outstanding misses.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if no entry can be allocated.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Returns true if a cacheable miss for `block` is outstanding.
    pub fn has_block(&self, block: u64) -> bool {
        self.entries.iter().any(|m| !m.uncached && m.block == block)
    }

    /// Allocates a new entry for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Backpressure::MshrExhausted`] when every entry is in use.
    pub fn allocate(
        &mut self,
        block: u64,
        fill: PacketId,
        target: Packet,
        uncached: bool,
        now: u64,
    ) -> Result<(), Rejected> {
        if self.is_full() {
            return Err(Rejected::new(target, Backpressure::MshrExhausted));
        }
        self.entries.push(Mshr {
            block,
            fill,
            targets: vec![target],
            uncached,
            allocated_at: now,
        });
        Ok(())
    }

    /// Adds `target` to the outstanding miss for `block`.
    ///
    /// # Errors
    ///
    /// Returns [`Backpressure::TargetsExhausted`] when the entry is full, or
    /// [`Backpressure::MshrExhausted`] if no miss for `block` is outstanding.
    pub fn merge(&mut self, block: u64, target: Packet) -> Result<(), Rejected> {
        let max = self.max_targets;
        match self
            .entries
            .iter_mut()
            .find(|m| !m.uncached && m.block == block)
        {
            Some(m) if m.targets.len() < max => {
                m.targets.push(target);
                Ok(())
            }
            Some(_) => Err(Rejected::new(target, Backpressure::TargetsExhausted)),
            None => Err(Rejected::new(target, Backpressure::MshrExhausted)),
        }
    }

    /// Removes and returns the entry waiting on response `fill`.
    pub fn complete(&mut self, fill: PacketId) -> Option<Mshr> {
        let idx = self.entries.iter().position(|m| m.fill == fill)?;
        Some(self.entries.swap_remove(idx))
    }
}
