//! Address ranges.
//!
//! Components on the memory side of the bus each claim a contiguous window of the
//! physical address space. This module provides:
//! 1. **Containment:** Whole-access checks so a request never straddles a window edge.
//! 2. **Overlap Detection:** Used by configuration validation and bus wiring.

use std::fmt;

/// A half-open physical address window `[start, start + size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddrRange {
    /// First byte of the window.
    pub start: u64,
    /// Window length in bytes.
    pub size: u64,
}

impl AddrRange {
    /// Creates a new address range.
    ///
    /// # Arguments
    ///
    /// * `start` - First byte of the window.
    /// * `size` - Window length in bytes.
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// Returns the exclusive end address, saturating at `u64::MAX`.
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    /// Returns true if `addr` falls inside the window.
    #[inline]
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// Returns true if the whole access `[addr, addr + len)` falls inside the window.
    ///
    /// # Arguments
    ///
    /// * `addr` - Start address of the access.
    /// * `len` - Access size in bytes.
    #[inline]
    pub const fn contains_access(&self, addr: u64, len: u64) -> bool {
        match addr.checked_add(len) {
            Some(end) => addr >= self.start && end <= self.end(),
            None => false,
        }
    }

    /// Returns true if the two windows share at least one byte.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.size != 0 && other.size != 0 && self.start < other.end() && other.start < self.end()
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end())
    }
}
