//! Memory packets.
//!
//! Every request that travels between the core, caches, bus and memory-side
//! targets is a [`Packet`]. A request becomes a response in place: the target
//! fills in `result` (and `data` for reads) and sends the same packet back, so
//! the identifier chosen by the originator is what routes it home.

use std::fmt;

use super::error::AccessFault;

/// Globally unique request identifier: originating component plus sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId {
    /// Component that created the request.
    pub origin: u32,
    /// Per-origin sequence number.
    pub seq: u64,
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.origin, self.seq)
    }
}

/// Allocates [`PacketId`]s for one component.
#[derive(Clone, Debug)]
pub struct PacketIdGen {
    origin: u32,
    next: u64,
}

impl PacketIdGen {
    /// Creates a generator for the given origin.
    pub const fn new(origin: u32) -> Self {
        Self { origin, next: 0 }
    }

    /// Returns the next unused identifier.
    pub const fn next_id(&mut self) -> PacketId {
        let id = PacketId {
            origin: self.origin,
            seq: self.next,
        };
        self.next += 1;
        id
    }
}

/// Memory command carried by a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemCmd {
    /// Read `size` bytes at `addr`.
    Read,
    /// Write `data` at `addr`.
    Write,
}

/// A memory request or, once `result` is set, its response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Request identifier.
    pub id: PacketId,
    /// Read or write.
    pub cmd: MemCmd,
    /// Physical start address.
    pub addr: u64,
    /// Access size in bytes.
    pub size: usize,
    /// Write payload, or read data once answered.
    pub data: Vec<u8>,
    /// Hardware thread that caused the access, if any.
    pub thread: Option<usize>,
    /// True for dirty-line writebacks issued by a cache.
    pub writeback: bool,
    /// `None` while in flight; the outcome once answered.
    pub result: Option<Result<(), AccessFault>>,
}

impl Packet {
    /// Builds a read request.
    ///
    /// # Arguments
    ///
    /// * `id` - Request identifier.
    /// * `addr` - Start address.
    /// * `size` - Number of bytes to read.
    pub const fn read(id: PacketId, addr: u64, size: usize) -> Self {
        Self {
            id,
            cmd: MemCmd::Read,
            addr,
            size,
            data: Vec::new(),
            thread: None,
            writeback: false,
            result: None,
        }
    }

    /// Builds a write request; the size is taken from the payload.
    pub fn write(id: PacketId, addr: u64, data: Vec<u8>) -> Self {
        Self {
            id,
            cmd: MemCmd::Write,
            addr,
            size: data.len(),
            data,
            thread: None,
            writeback: false,
            result: None,
        }
    }

    /// Tags the request with the hardware thread that issued it.
    #[must_use]
    pub fn with_thread(mut self, thread: usize) -> Self {
        self.thread = Some(thread);
        self
    }

    /// Returns true for read requests.
    pub fn is_read(&self) -> bool {
        self.cmd == MemCmd::Read
    }

    /// Returns true for write requests.
    pub fn is_write(&self) -> bool {
        self.cmd == MemCmd::Write
    }

    /// Returns true once the packet has been answered.
    pub const fn is_response(&self) -> bool {
        self.result.is_some()
    }

    /// Returns the fault carried by an error response.
    pub fn fault(&self) -> Option<AccessFault> {
        match self.result {
            Some(Err(fault)) => Some(fault),
            _ => None,
        }
    }

    /// Turns the request into a successful response.
    ///
    /// Reads carry `data` (truncated or zero-padded to `size`); writes drop their payload.
    pub fn respond(&mut self, data: &[u8]) {
        if self.is_read() {
            self.data.clear();
            self.data.extend_from_slice(&data[..data.len().min(self.size)]);
            self.data.resize(self.size, 0);
        } else {
            self.data.clear();
        }
        self.result = Some(Ok(()));
    }

    /// Turns the request into an error response.
    pub fn fail(&mut self, fault: AccessFault) {
        self.data.clear();
        if self.is_read() {
            self.data.resize(self.size, 0);
        }
        self.result = Some(Err(fault));
    }

    /// Interprets the first eight bytes of the payload as a little-endian word.
    pub fn word(&self) -> u64 {
        let mut buf = [0u8; 8];
        let n = self.data.len().min(8);
        buf[..n].copy_from_slice(&self.data[..n]);
        u64::from_le_bytes(buf)
    }
}
