//! Set-Associative Timing Cache.
//!
//! This module implements a non-blocking, write-back, write-allocate cache that sits
//! between an upstream requestor (the core or a bus) and a downstream bus. It provides:
//! 1. **Lookup:** Set index and tag from the address; hits answer after
//!    `tagLatency + dataLatency` cycles.
//! 2. **Misses:** Each distinct missing line takes an MSHR and sends one fill downstream.
//!    Later requests to the same line merge into that MSHR up to `targetsPerMshr`.
//! 3. **Backpressure:** A request that cannot get an MSHR or a target slot is handed back
//!    to the sender, which retries on a later cycle.
//! 4. **Writebacks:** Dirty victims are written downstream. Until the write is acknowledged
//!    the block sits in a writeback buffer and misses to it stall.
//! 5. **Uncacheable Windows:** Accesses to device ranges bypass the array.

/// Miss status holding registers.
pub mod mshr;

/// Cache replacement policy implementations (LRU, FIFO, Random).
pub mod policies;

use std::collections::{HashMap, VecDeque};

use tracing::{trace, warn};

use self::mshr::MshrTable;
use self::policies::{Policy, ReplacementPolicy};
use crate::common::{
    AccessFault, AddrRange, Backpressure, Packet, PacketId, PacketIdGen, Port, Rejected,
};
use crate::config::CacheConfig;
use crate::sim::clock::DelayQueue;
use crate::soc::interconnect::{BusPort, Upstream};
use crate::soc::traits::Responder;

/// Cache line entry containing tag, validity, dirty bit and data.
#[derive(Clone, Debug, Default)]
struct CacheLine {
    tag: u64,
    valid: bool,
    dirty: bool,
    data: Vec<u8>,
}

/// Cache counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests that hit.
    pub hits: u64,
    /// Requests that allocated a new MSHR.
    pub misses: u64,
    /// Requests merged into an outstanding MSHR.
    pub merged: u64,
    /// Dirty lines written back.
    pub writebacks: u64,
    /// Valid lines evicted (clean or dirty).
    pub evictions: u64,
    /// Requests refused for lack of an MSHR.
    pub mshr_stalls: u64,
    /// Requests refused because the MSHR target list was full.
    pub target_stalls: u64,
    /// Requests refused because the block was in the writeback buffer.
    pub writeback_stalls: u64,
    /// Requests that bypassed the array.
    pub uncached: u64,
    /// Fills that returned an error.
    pub fill_errors: u64,
}

impl CacheStats {
    /// Hit rate over hits, misses and merged misses.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.merged;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A non-blocking set-associative cache.
#[derive(Debug)]
pub struct Cache {
    name: String,
    lines: Vec<CacheLine>,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
    hit_latency: u64,
    tag_latency: u64,
    response_latency: u64,
    policy: Policy,
    mshrs: MshrTable,
    writebacks: HashMap<u64, PacketId>,
    responses: DelayQueue<Packet>,
    outbox: VecDeque<(u64, Packet)>,
    uncacheable: Vec<AddrRange>,
    ids: PacketIdGen,
    /// Where responses go.
    pub cpu_side: Port<Upstream>,
    /// Where fills and writebacks go.
    pub mem_side: Port<BusPort>,
    /// Statistics.
    pub stats: CacheStats,
}

impl Cache {
    /// Creates a cache.
    ///
    /// # Arguments
    ///
    /// * `name` - Label, e.g. `"l1d"`.
    /// * `origin` - Packet origin id for fills and writebacks; unique per component.
    /// * `config` - Geometry, latencies and MSHR limits (already validated).
    /// * `seed` - Seed for the random replacement policy.
    pub fn new(name: impl Into<String>, origin: u32, config: &CacheConfig, seed: u64) -> Self {
        let name = name.into();
        let ways = config.cache_associativity.max(1);
        let num_sets = config.num_sets().max(1);
        let line_bytes = config.line_size;
        Self {
            lines: vec![
                CacheLine {
                    data: vec![0; line_bytes],
                    ..CacheLine::default()
                };
                num_sets * ways
            ],
            num_sets,
            ways,
            line_bytes,
            hit_latency: config.tag_latency + config.data_latency,
            tag_latency: config.tag_latency,
            response_latency: config.response_latency,
            policy: Policy::new(config.replacement_policy, num_sets, ways, seed ^ u64::from(origin)),
            mshrs: MshrTable::new(config.mshr_count, config.targets_per_mshr),
            writebacks: HashMap::new(),
            responses: DelayQueue::new(),
            outbox: VecDeque::new(),
            uncacheable: Vec::new(),
            ids: PacketIdGen::new(origin),
            cpu_side: Port::new(format!("{name}.cpu_side")),
            mem_side: Port::new(format!("{name}.mem_side")),
            stats: CacheStats::default(),
            name,
        }
    }

    /// Marks `range` as uncacheable.
    pub fn add_uncacheable(&mut self, range: AddrRange) {
        self.uncacheable.push(range);
    }

    /// Line size in bytes.
    pub const fn line_bytes(&self) -> usize {
        self.line_bytes
    }

    /// Number of sets.
    pub const fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Associativity.
    pub const fn ways(&self) -> usize {
        self.ways
    }

    /// Outstanding misses.
    pub fn outstanding_misses(&self) -> usize {
        self.mshrs.len()
    }

    /// Blocks waiting for a writeback acknowledgement.
    pub fn pending_writebacks(&self) -> usize {
        self.writebacks.len()
    }

    /// Valid lines held.
    pub fn valid_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.valid).count()
    }

    /// Valid lines held in `set`.
    pub fn valid_lines_in_set(&self, set: usize) -> usize {
        self.lines[set * self.ways..(set + 1) * self.ways]
            .iter()
            .filter(|l| l.valid)
            .count()
    }

    /// Returns true if the line containing `addr` is present.
    pub fn contains(&self, addr: u64) -> bool {
        self.find_way(addr).is_some()
    }

    /// Returns true if the line containing `addr` is present and dirty.
    pub fn is_dirty(&self, addr: u64) -> bool {
        self.find_way(addr)
            .is_some_and(|way| self.lines[self.slot(addr, way)].dirty)
    }

    #[inline]
    const fn block_of(&self, addr: u64) -> u64 {
        addr & !(self.line_bytes as u64 - 1)
    }

    #[inline]
    const fn set_of(&self, addr: u64) -> usize {
        ((addr / self.line_bytes as u64) % self.num_sets as u64) as usize
    }

    #[inline]
    const fn tag_of(&self, addr: u64) -> u64 {
        addr / self.line_bytes as u64 / self.num_sets as u64
    }

    #[inline]
    const fn slot(&self, addr: u64, way: usize) -> usize {
        self.set_of(addr) * self.ways + way
    }

    fn find_way(&self, addr: u64) -> Option<usize> {
        let set = self.set_of(addr);
        let tag = self.tag_of(addr);
        self.lines[set * self.ways..(set + 1) * self.ways]
            .iter()
            .position(|l| l.valid && l.tag == tag)
    }

    fn is_uncacheable(&self, addr: u64) -> bool {
        self.uncacheable.iter().any(|r| r.contains(addr))
    }

    /// Performs `pkt` against the resident line in `way` and turns it into a response.
    fn access_line(&mut self, pkt: &mut Packet, way: usize) {
        let slot = self.slot(pkt.addr, way);
        let off = (pkt.addr - self.block_of(pkt.addr)) as usize;
        let line = &mut self.lines[slot];
        if pkt.is_write() {
            line.data[off..off + pkt.size].copy_from_slice(&pkt.data[..pkt.size]);
            line.dirty = true;
            pkt.respond(&[]);
        } else {
            pkt.respond(&line.data[off..off + pkt.size]);
        }
    }

    /// Sends the request for a new miss or uncached access downstream.
    fn issue(&mut self, target: Packet, now: u64, uncached: bool) -> Result<(), Rejected> {
        if self.mshrs.is_full() {
            self.stats.mshr_stalls += 1;
            return Err(Rejected::new(target, Backpressure::MshrExhausted));
        }
        let id = self.ids.next_id();
        let mut downstream = if uncached {
            let mut p = target.clone();
            p.id = id;
            p
        } else {
            Packet::read(id, self.block_of(target.addr), self.line_bytes)
        };
        downstream.thread = target.thread;
        let block = if uncached {
            target.addr
        } else {
            self.block_of(target.addr)
        };
        trace!(cache = %self.name, id = %id, block, uncached, "miss sent downstream");
        self.mshrs.allocate(block, id, target, uncached, now)?;
        self.outbox.push_back((now + self.tag_latency, downstream));
        Ok(())
    }

    /// Chooses a way in the set of `addr`, writing back a dirty victim.
    fn make_room(&mut self, addr: u64, now: u64) -> usize {
        let set = self.set_of(addr);
        let base = set * self.ways;
        if let Some(way) = self.lines[base..base + self.ways].iter().position(|l| !l.valid) {
            return way;
        }
        let way = self.policy.get_victim(set);
        let victim = &mut self.lines[base + way];
        self.stats.evictions += 1;
        victim.valid = false;
        if victim.dirty {
            victim.dirty = false;
            let victim_addr = (victim.tag * self.num_sets as u64 + set as u64) * self.line_bytes as u64;
            let data = victim.data.clone();
            let id = self.ids.next_id();
            let mut wb = Packet::write(id, victim_addr, data);
            wb.writeback = true;
            let _ = self.writebacks.insert(victim_addr, id);
            self.stats.writebacks += 1;
            trace!(cache = %self.name, id = %id, block = victim_addr, "dirty victim written back");
            self.outbox.push_back((now, wb));
        }
        way
    }

    /// Accepts a response from the mem side.
    ///
    /// Fills install their line and answer every merged target in arrival order.
    /// Error fills answer every target with the same fault and install nothing.
    pub fn receive_response(&mut self, pkt: Packet, now: u64) {
        let acked = self
            .writebacks
            .iter()
            .find_map(|(&block, &id)| (id == pkt.id).then_some(block));
        if let Some(block) = acked {
            let _ = self.writebacks.remove(&block);
            if let Some(fault) = pkt.fault() {
                warn!(cache = %self.name, block, %fault, "writeback failed");
            }
            return;
        }
        let Some(mshr) = self.mshrs.complete(pkt.id) else {
            warn!(cache = %self.name, id = %pkt.id, "response matches no outstanding miss");
            return;
        };

        if mshr.uncached {
            for mut target in mshr.targets {
                match pkt.result {
                    Some(Err(fault)) => target.fail(fault),
                    _ => target.respond(&pkt.data),
                }
                self.responses.schedule(now, self.response_latency, target);
            }
            return;
        }

        if let Some(fault) = pkt.fault() {
            self.stats.fill_errors += 1;
            for mut target in mshr.targets {
                target.fail(fault);
                self.responses.schedule(now, self.response_latency, target);
            }
            return;
        }

        let way = self.make_room(mshr.block, now);
        let slot = self.slot(mshr.block, way);
        let tag = self.tag_of(mshr.block);
        let line = &mut self.lines[slot];
        line.tag = tag;
        line.valid = true;
        line.dirty = false;
        line.data.fill(0);
        let n = pkt.data.len().min(self.line_bytes);
        line.data[..n].copy_from_slice(&pkt.data[..n]);
        self.policy.fill(self.set_of(mshr.block), way);

        for mut target in mshr.targets {
            self.access_line(&mut target, way);
            self.responses.schedule(now, self.response_latency, target);
        }
    }

    /// Hands queued mem-side requests to `send` until it refuses one.
    pub fn send_outbound<F>(&mut self, now: u64, mut send: F)
    where
        F: FnMut(Packet) -> Result<(), Rejected>,
    {
        while self.outbox.front().is_some_and(|(ready, _)| *ready <= now) {
            let Some((ready, pkt)) = self.outbox.pop_front() else {
                break;
            };
            if let Err(rejected) = send(pkt) {
                self.outbox.push_front((ready, rejected.packet));
                break;
            }
        }
    }

    /// Untimed read of the resident copy of `[addr, addr + len)`, if present.
    pub fn peek(&self, addr: u64, len: usize) -> Option<Vec<u8>> {
        let way = self.find_way(addr)?;
        let off = (addr - self.block_of(addr)) as usize;
        let line = &self.lines[self.slot(addr, way)];
        line.data.get(off..off + len).map(<[u8]>::to_vec)
    }
}

impl Responder for Cache {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_request(&mut self, mut pkt: Packet, now: u64) -> Result<(), Rejected> {
        if self.is_uncacheable(pkt.addr) {
            self.issue(pkt, now, true)?;
            self.stats.uncached += 1;
            return Ok(());
        }

        let off = pkt.addr - self.block_of(pkt.addr);
        if pkt.size == 0 || off + pkt.size as u64 > self.line_bytes as u64 {
            pkt.fail(AccessFault::Misaligned {
                addr: pkt.addr,
                size: pkt.size,
            });
            self.responses.schedule(now, self.hit_latency, pkt);
            return Ok(());
        }

        let block = self.block_of(pkt.addr);
        if self.writebacks.contains_key(&block) {
            self.stats.writeback_stalls += 1;
            return Err(Rejected::new(pkt, Backpressure::WritebackPending));
        }

        if let Some(way) = self.find_way(pkt.addr) {
            self.stats.hits += 1;
            self.policy.update(self.set_of(pkt.addr), way);
            self.access_line(&mut pkt, way);
            trace!(cache = %self.name, id = %pkt.id, addr = pkt.addr, "hit");
            self.responses.schedule(now, self.hit_latency, pkt);
            return Ok(());
        }

        if self.mshrs.has_block(block) {
            return match self.mshrs.merge(block, pkt) {
                Ok(()) => {
                    self.stats.merged += 1;
                    Ok(())
                }
                Err(rejected) => {
                    self.stats.target_stalls += 1;
                    Err(rejected)
                }
            };
        }

        self.issue(pkt, now, false)?;
        self.stats.misses += 1;
        Ok(())
    }

    fn tick(&mut self, now: u64) -> Vec<Packet> {
        self.responses.drain_due(now)
    }

    fn busy(&self) -> bool {
        !self.mshrs.is_empty()
            || !self.responses.is_empty()
            || !self.outbox.is_empty()
            || !self.writebacks.is_empty()
    }
}
