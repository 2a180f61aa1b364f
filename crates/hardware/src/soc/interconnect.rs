//! System interconnect (bus) between caches and memory-side targets.
//!
//! This module implements the crossbar that carries requests from cpu-side ports to
//! memory-side targets and carries responses back. It provides:
//! 1. **Address Routing:** Each memory-side port may claim an address window; the one
//!    port without a window is the default route.
//! 2. **Arbitration:** Round-robin over cpu-side ports, at most one grant per target per
//!    cycle. A refused request stays at the head of its port queue and is retried.
//! 3. **Response Routing:** Responses find their port by request id and are delivered in
//!    that port's request order. There is no ordering across ports.
//! 4. **Unmapped Accesses:** Without a matching window or default route the bus answers
//!    the request itself with [`AccessFault::Unmapped`].

use std::collections::{HashMap, VecDeque};

use tracing::{trace, warn};

use crate::common::{
    AccessFault, AddrRange, Backpressure, ConfigError, Packet, PacketId, Port, Rejected,
};

/// A memory-side destination of the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The cpu side of a cache (by cache index).
    Cache(usize),
    /// The DRAM channel.
    Memory,
    /// The interrupt controller PIO window.
    Interrupts,
}

/// A cpu-side port of a particular bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BusPort {
    /// Bus index.
    pub bus: usize,
    /// Cpu-side port index on that bus.
    pub port: usize,
}

/// Where a cache's cpu-side responses go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Upstream {
    /// The core's instruction or data port.
    Core,
    /// A memory-side port of a bus.
    Bus(usize),
}

/// Bus counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Requests forwarded to a target.
    pub grants: u64,
    /// Requests a target refused (retried later).
    pub target_refusals: u64,
    /// Requests refused because a port queue was full.
    pub queue_full: u64,
    /// Requests answered with `Unmapped`.
    pub unmapped: u64,
    /// Responses delivered to cpu-side ports.
    pub responses: u64,
}

#[derive(Debug)]
struct CpuPort {
    peer: Port<usize>,
    requests: VecDeque<(u64, Packet)>,
    order: VecDeque<PacketId>,
    ready: HashMap<PacketId, (u64, Packet)>,
}

#[derive(Debug)]
struct MemPort {
    peer: Port<Target>,
    range: Option<AddrRange>,
}

/// Crossbar with N cpu-side ports and one or more memory-side ports.
#[derive(Debug)]
pub struct SystemBus {
    name: String,
    latency: u64,
    queue_depth: usize,
    cpu_ports: Vec<CpuPort>,
    mem_ports: Vec<MemPort>,
    routes: HashMap<PacketId, usize>,
    rr: usize,
    /// Statistics.
    pub stats: BusStats,
}

impl SystemBus {
    /// Creates a bus with no ports.
    ///
    /// # Arguments
    ///
    /// * `name` - Label for logs and wiring errors.
    /// * `latency` - Cycles a request waits before arbitration and a response before delivery.
    /// * `queue_depth` - Requests buffered per cpu-side port.
    pub fn new(name: impl Into<String>, latency: u64, queue_depth: usize) -> Self {
        Self {
            name: name.into(),
            latency,
            queue_depth,
            cpu_ports: Vec::new(),
            mem_ports: Vec::new(),
            routes: HashMap::new(),
            rr: 0,
            stats: BusStats::default(),
        }
    }

    /// Bus label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds an unconnected cpu-side port and returns its index.
    pub fn add_cpu_port(&mut self) -> usize {
        let idx = self.cpu_ports.len();
        self.cpu_ports.push(CpuPort {
            peer: Port::new(format!("{}.cpu_side[{idx}]", self.name)),
            requests: VecDeque::new(),
            order: VecDeque::new(),
            ready: HashMap::new(),
        });
        idx
    }

    /// Connects the cache whose mem side drives cpu-side port `port`.
    ///
    /// # Returns
    ///
    /// The previously connected cache, or `None` if the port index is new or was free.
    pub fn connect_cpu_port(&mut self, port: usize, cache: usize) -> Option<usize> {
        self.cpu_ports.get_mut(port)?.peer.connect(cache)
    }

    /// Cache connected to cpu-side port `port`.
    pub fn cpu_port_peer(&self, port: usize) -> Option<usize> {
        self.cpu_ports.get(port)?.peer.peer()
    }

    /// Adds a memory-side port.
    ///
    /// # Arguments
    ///
    /// * `target` - Component behind the port.
    /// * `range` - Address window it claims; `None` makes it the default route.
    ///
    /// # Returns
    ///
    /// The port index.
    pub fn add_mem_port(&mut self, target: Target, range: Option<AddrRange>) -> usize {
        let idx = self.mem_ports.len();
        let mut peer = Port::new(format!("{}.mem_side[{idx}]", self.name));
        let _ = peer.connect(target);
        self.mem_ports.push(MemPort { peer, range });
        idx
    }

    /// Number of cpu-side ports.
    pub fn cpu_port_count(&self) -> usize {
        self.cpu_ports.len()
    }

    /// Checks that every port is connected, at least one memory-side port exists, at
    /// most one of them is a default route and no two windows overlap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] naming the problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cpu_ports.is_empty() {
            return Err(ConfigError::invalid(format!("{} has no cpu-side ports", self.name)));
        }
        for port in &self.cpu_ports {
            let _ = port.peer.require()?;
        }
        if self.mem_ports.is_empty() {
            return Err(ConfigError::invalid(format!("{} has no mem-side ports", self.name)));
        }
        let defaults = self.mem_ports.iter().filter(|p| p.range.is_none()).count();
        if defaults > 1 {
            return Err(ConfigError::invalid(format!(
                "{} has {defaults} default routes",
                self.name
            )));
        }
        let ranges: Vec<AddrRange> = self.mem_ports.iter().filter_map(|p| p.range).collect();
        for (i, a) in ranges.iter().enumerate() {
            if let Some(b) = ranges[i + 1..].iter().find(|b| a.overlaps(b)) {
                return Err(ConfigError::invalid(format!(
                    "{}: windows {a} and {b} overlap",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Resolves the target for `addr`: a claiming window first, then the default route.
    pub fn route(&self, addr: u64) -> Option<Target> {
        self.mem_ports
            .iter()
            .find(|p| p.range.is_some_and(|r| r.contains(addr)))
            .or_else(|| self.mem_ports.iter().find(|p| p.range.is_none()))
            .and_then(|p| p.peer.peer())
    }

    /// Offers a request on cpu-side port `port` at cycle `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Backpressure::QueueFull`] when the port queue is full.
    pub fn try_request(&mut self, port: usize, pkt: Packet, now: u64) -> Result<(), Rejected> {
        let Some(cpu) = self.cpu_ports.get_mut(port) else {
            return Err(Rejected::new(pkt, Backpressure::QueueFull));
        };
        if cpu.requests.len() >= self.queue_depth {
            self.stats.queue_full += 1;
            return Err(Rejected::new(pkt, Backpressure::QueueFull));
        }
        trace!(bus = %self.name, port, id = %pkt.id, addr = pkt.addr, "bus request queued");
        cpu.order.push_back(pkt.id);
        let _ = self.routes.insert(pkt.id, port);
        cpu.requests.push_back((now + self.latency, pkt));
        Ok(())
    }

    /// Runs one cycle of arbitration.
    ///
    /// Visits cpu-side ports round-robin starting after the last port granted. The head
    /// request of each port is offered to its target through `send`; a target that
    /// refuses, or that was already granted this cycle, is not offered anything else.
    pub fn arbitrate<F>(&mut self, now: u64, mut send: F)
    where
        F: FnMut(Target, Packet) -> Result<(), Rejected>,
    {
        let n = self.cpu_ports.len();
        let mut used: Vec<Target> = Vec::new();
        let mut last_grant = None;
        for k in 0..n {
            let p = (self.rr + k) % n;
            let addr = match self.cpu_ports[p].requests.front() {
                Some((ready_at, pkt)) if *ready_at <= now => pkt.addr,
                _ => continue,
            };
            let target = self.route(addr);
            let Some((ready_at, mut pkt)) = self.cpu_ports[p].requests.pop_front() else {
                continue;
            };
            let Some(target) = target else {
                self.stats.unmapped += 1;
                pkt.fail(AccessFault::Unmapped { addr });
                let _ = self.respond(pkt, now);
                continue;
            };
            if used.contains(&target) {
                self.cpu_ports[p].requests.push_front((ready_at, pkt));
                continue;
            }
            used.push(target);
            match send(target, pkt) {
                Ok(()) => {
                    self.stats.grants += 1;
                    last_grant = Some(p);
                }
                Err(rejected) => {
                    self.stats.target_refusals += 1;
                    self.cpu_ports[p]
                        .requests
                        .push_front((ready_at, rejected.packet));
                }
            }
        }
        if let Some(p) = last_grant {
            self.rr = (p + 1) % n;
        }
    }

    /// Accepts a response from a memory-side target.
    ///
    /// # Returns
    ///
    /// `false` if no outstanding request matches the response id.
    pub fn respond(&mut self, pkt: Packet, now: u64) -> bool {
        let Some(port) = self.routes.remove(&pkt.id) else {
            warn!(bus = %self.name, id = %pkt.id, "dropping response with unknown id");
            return false;
        };
        let _ = self.cpu_ports[port]
            .ready
            .insert(pkt.id, (now + self.latency, pkt));
        true
    }

    /// Removes the responses deliverable at `now`, as `(port, packet)` pairs.
    ///
    /// A response waits until every earlier request of the same port has been answered.
    pub fn deliver(&mut self, now: u64) -> Vec<(usize, Packet)> {
        let mut out = Vec::new();
        for (idx, port) in self.cpu_ports.iter_mut().enumerate() {
            while let Some(&head) = port.order.front() {
                match port.ready.get(&head) {
                    Some((ready_at, _)) if *ready_at <= now => {}
                    _ => break,
                }
                let Some((_, pkt)) = port.ready.remove(&head) else {
                    break;
                };
                let _ = port.order.pop_front();
                out.push((idx, pkt));
            }
        }
        self.stats.responses += out.len() as u64;
        out
    }

    /// Returns true while any request or response is inside the bus.
    pub fn busy(&self) -> bool {
        !self.routes.is_empty()
            || self
                .cpu_ports
                .iter()
                .any(|p| !p.requests.is_empty() || !p.ready.is_empty())
    }
}
