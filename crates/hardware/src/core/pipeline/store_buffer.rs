//! Store Buffer for post-commit memory writes.
//!
//! Stores write the data cache only after they commit. The store buffer holds
//! committed stores and provides:
//! 1. **Drain:** The oldest unsent store goes to the data cache, one per cycle.
//! 2. **Forwarding:** Loads read the youngest buffered store to their address.
//! 3. **Acknowledge:** An entry leaves the buffer when the cache answers its write.

use std::collections::VecDeque;

use crate::common::PacketId;

/// A committed store waiting for the data cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreEntry {
    /// Fetch address of the store, for fault reports.
    pub pc: u64,
    /// Target address.
    pub addr: u64,
    /// Value written.
    pub data: u64,
    /// Id of the write once sent.
    pub sent: Option<PacketId>,
}

/// FIFO of committed stores.
#[derive(Clone, Debug)]
pub struct StoreBuffer {
    entries: VecDeque<StoreEntry>,
    capacity: usize,
}

impl StoreBuffer {
    /// Creates a new store buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the number of buffered stores.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no stores are buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if no store can be accepted.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Buffers a committed store.
    ///
    /// # Returns
    ///
    /// `false` if the buffer is full.
    pub fn push(&mut self, pc: u64, addr: u64, data: u64) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push_back(StoreEntry {
            pc,
            addr,
            data,
            sent: None,
        });
        true
    }

    /// Value of the youngest buffered store to `addr`.
    pub fn forward(&self, addr: u64) -> Option<u64> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.addr == addr)
            .map(|e| e.data)
    }

    /// Oldest store not yet sent, provided every older store has been sent.
    pub fn next_unsent(&mut self) -> Option<&mut StoreEntry> {
        self.entries.iter_mut().find(|e| e.sent.is_none())
    }

    /// Removes the store whose write was answered by `id`.
    pub fn acknowledge(&mut self, id: PacketId) -> Option<StoreEntry> {
        let idx = self.entries.iter().position(|e| e.sent == Some(id))?;
        self.entries.remove(idx)
    }
}
