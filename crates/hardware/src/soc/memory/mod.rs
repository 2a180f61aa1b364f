//! Timing Memory Model.
//!
//! This module implements the main memory channel. It provides:
//! 1. **Buffer:** Sparse backing storage ([`DramBuffer`]) for memory contents.
//! 2. **Controller:** Latency modeling (simple or DRAM row-buffer) for timing simulation.
//! 3. **Channel:** [`TimingMemory`], a bounded request/response [`Responder`] mapped at
//!    `[0, memorySize)` that returns at most one response per cycle.

/// Sparse page store for memory contents.
pub mod buffer;

/// Memory controller implementations for access latency modeling.
pub mod controller;

use tracing::trace;

use self::buffer::DramBuffer;
use self::controller::MemoryController;
use crate::common::{AccessFault, AddrRange, Backpressure, Packet, Rejected};
use crate::config::Config;
use crate::sim::clock::DelayQueue;
use crate::soc::traits::Responder;

/// Latency of an error response for an out-of-range access.
const FAULT_LATENCY: u64 = 1;

/// Counters kept by the memory channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Reads serviced.
    pub reads: u64,
    /// Writes serviced.
    pub writes: u64,
    /// Bytes transferred.
    pub bytes: u64,
    /// Accesses answered with `OutOfRangeAccess`.
    pub faults: u64,
    /// Requests refused because the channel was full.
    pub refused: u64,
    /// Sum of controller latencies, for the average.
    pub total_latency: u64,
}

/// Single DRAM channel with fixed or row-dependent latency.
#[derive(Debug)]
pub struct TimingMemory {
    range: AddrRange,
    buffer: DramBuffer,
    controller: Box<dyn MemoryController>,
    queue_depth: usize,
    pending: DelayQueue<Packet>,
    /// Statistics.
    pub stats: MemoryStats,
}

impl TimingMemory {
    /// Creates a memory channel.
    ///
    /// # Arguments
    ///
    /// * `size` - Memory size in bytes, mapped at address 0.
    /// * `controller` - Latency model.
    /// * `queue_depth` - Maximum requests in flight.
    pub fn new(size: u64, controller: Box<dyn MemoryController>, queue_depth: usize) -> Self {
        Self {
            range: AddrRange::new(0, size),
            buffer: DramBuffer::new(),
            controller,
            queue_depth,
            pending: DelayQueue::new(),
            stats: MemoryStats::default(),
        }
    }

    /// Creates the channel described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.memory_size.0,
            controller::from_config(&config.memory),
            config.memory.queue_depth,
        )
    }

    /// Address window served by this channel.
    pub const fn range(&self) -> AddrRange {
        self.range
    }

    /// Requests accepted but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Untimed read of memory contents, for inspection and tests.
    pub fn peek(&self, addr: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        if self.range.contains_access(addr, len as u64) {
            self.buffer.read(addr, &mut out);
        }
        out
    }

    /// Untimed write of memory contents, for preloading data.
    pub fn poke(&mut self, addr: u64, data: &[u8]) {
        if self.range.contains_access(addr, data.len() as u64) {
            self.buffer.write(addr, data);
        }
    }
}

impl Responder for TimingMemory {
    fn name(&self) -> &str {
        "dram"
    }

    fn try_request(&mut self, mut pkt: Packet, now: u64) -> Result<(), Rejected> {
        if self.pending.len() >= self.queue_depth {
            self.stats.refused += 1;
            return Err(Rejected::new(pkt, Backpressure::Busy));
        }
        if !self.range.contains_access(pkt.addr, pkt.size as u64) {
            trace!(id = %pkt.id, addr = pkt.addr, "memory access out of range");
            self.stats.faults += 1;
            pkt.fail(AccessFault::OutOfRangeAccess {
                addr: pkt.addr,
                size: pkt.size,
            });
            self.pending.schedule(now, FAULT_LATENCY, pkt);
            return Ok(());
        }

        let latency = self.controller.access_latency(pkt.addr);
        self.stats.total_latency += latency;
        self.stats.bytes += pkt.size as u64;
        if pkt.is_write() {
            self.stats.writes += 1;
            self.buffer.write(pkt.addr, &pkt.data);
            pkt.respond(&[]);
        } else {
            self.stats.reads += 1;
            let mut data = vec![0; pkt.size];
            self.buffer.read(pkt.addr, &mut data);
            pkt.respond(&data);
        }
        trace!(id = %pkt.id, addr = pkt.addr, latency, "memory accepted");
        self.pending.schedule(now, latency, pkt);
        Ok(())
    }

    fn tick(&mut self, now: u64) -> Vec<Packet> {
        self.pending.pop_due(now).into_iter().collect()
    }

    fn busy(&self) -> bool {
        !self.pending.is_empty()
    }
}
