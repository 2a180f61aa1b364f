//! System construction and the top-level `System` type.
//!
//! This module assembles the component graph. It performs:
//! 1. **Explicit Wiring:** [`SystemBuilder`] exposes one typed call per kind of link
//!    (core to cache, cache to bus, bus to cache, bus to memory, bus to interrupts).
//! 2. **Validation:** `build` fails with `InvalidConfiguration` on any missing link.
//! 3. **Standard Layout:** [`System::from_config`] builds L1I/L1D, an optional L2 behind
//!    an L2 bus, the memory bus, the DRAM channel and the interrupt controller.
//! 4. **Cycle Order:** [`System::tick`] advances core, buses, caches, then memory-side
//!    targets.

use tracing::{debug, warn};

use crate::common::{Backpressure, ConfigError, Packet, Rejected};
use crate::config::Config;
use crate::core::units::cache::Cache;
use crate::core::{Core, CoreMemory, CorePort};
use crate::soc::devices::InterruptController;
use crate::soc::interconnect::{BusPort, SystemBus, Target, Upstream};
use crate::soc::memory::TimingMemory;
use crate::soc::traits::Responder;

/// Packet origin of the core.
const CORE_ORIGIN: u32 = 0;

/// Typed handle of a cache added to a [`SystemBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheId(pub usize);

/// Typed handle of a bus added to a [`SystemBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusId(pub usize);

/// Assembled component graph.
#[derive(Debug)]
pub struct System {
    /// The processor core.
    pub core: Core,
    /// All caches, indexed by [`CacheId`].
    pub caches: Vec<Cache>,
    /// All buses, indexed by [`BusId`].
    pub buses: Vec<SystemBus>,
    /// DRAM channel.
    pub memory: TimingMemory,
    /// Interrupt controller.
    pub interrupts: InterruptController,
    inst_cache: usize,
    data_cache: usize,
    memory_bus: usize,
    interrupts_bus: Option<usize>,
}

/// Adapter giving the core access to its two L1 caches.
struct CorePorts<'a> {
    caches: &'a mut [Cache],
    inst: usize,
    data: usize,
}

impl CoreMemory for CorePorts<'_> {
    fn send(&mut self, port: CorePort, pkt: Packet, now: u64) -> Result<(), Rejected> {
        let idx = match port {
            CorePort::Inst => self.inst,
            CorePort::Data => self.data,
        };
        match self.caches.get_mut(idx) {
            Some(cache) => cache.try_request(pkt, now),
            None => Err(Rejected::new(pkt, Backpressure::Busy)),
        }
    }
}

impl System {
    /// Builds the standard hierarchy described by `config`.
    ///
    /// Without `cache.l2` both L1s sit on the memory bus. With it, both L1s sit on an
    /// L2 bus whose only target is the L2, and the L2 sits on the memory bus. The
    /// memory bus routes the interrupt PIO window to the controller and everything
    /// else to DRAM. The PIO window is uncacheable in every cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if `config` does not validate.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let threads = config.core.thread_count;
        let interrupts =
            InterruptController::new(config.interrupts.base, threads, config.interrupts.latency);
        let pio = interrupts.range();

        let mut b = SystemBuilder::new();
        b.set_core(Core::new(
            &config.core,
            CORE_ORIGIN,
            config.cache.l1i.line_size,
        ));
        b.set_memory(TimingMemory::from_config(config));
        b.set_interrupts(interrupts);

        let mut l1i = Cache::new("l1i", 1, &config.cache.l1i, config.seed);
        let mut l1d = Cache::new("l1d", 2, &config.cache.l1d, config.seed);
        l1i.add_uncacheable(pio);
        l1d.add_uncacheable(pio);
        let l1i = b.add_cache(l1i);
        let l1d = b.add_cache(l1d);
        b.connect_core_inst(l1i);
        b.connect_core_data(l1d);

        let membus = b.add_bus(SystemBus::new(
            "membus",
            config.bus.latency,
            config.bus.queue_depth,
        ));
        if let Some(l2_config) = &config.cache.l2 {
            let mut l2 = Cache::new("l2", 3, l2_config, config.seed);
            l2.add_uncacheable(pio);
            let l2 = b.add_cache(l2);
            let l2bus = b.add_bus(SystemBus::new(
                "l2bus",
                config.bus.latency,
                config.bus.queue_depth,
            ));
            b.connect_cache_to_bus(l1i, l2bus);
            b.connect_cache_to_bus(l1d, l2bus);
            b.connect_bus_to_cache(l2bus, l2);
            b.connect_cache_to_bus(l2, membus);
        } else {
            b.connect_cache_to_bus(l1i, membus);
            b.connect_cache_to_bus(l1d, membus);
        }
        b.connect_bus_to_memory(membus);
        b.connect_bus_to_interrupts(membus);
        b.build()
    }

    /// Advances every component by one cycle: core, buses, caches, memory-side targets.
    pub fn tick(&mut self, now: u64) {
        let mut ports = CorePorts {
            caches: &mut self.caches,
            inst: self.inst_cache,
            data: self.data_cache,
        };
        self.core.tick(now, &mut ports, &mut self.interrupts);

        for b in 0..self.buses.len() {
            let caches = &mut self.caches;
            let memory = &mut self.memory;
            let intc = &mut self.interrupts;
            self.buses[b].arbitrate(now, |target, pkt| match target {
                Target::Cache(c) => match caches.get_mut(c) {
                    Some(cache) => cache.try_request(pkt, now),
                    None => Err(Rejected::new(pkt, Backpressure::Busy)),
                },
                Target::Memory => memory.try_request(pkt, now),
                Target::Interrupts => intc.try_request(pkt, now),
            });
            for (port, pkt) in self.buses[b].deliver(now) {
                match self.buses[b].cpu_port_peer(port) {
                    Some(c) if c < self.caches.len() => self.caches[c].receive_response(pkt, now),
                    _ => warn!(bus = %self.buses[b].name(), port, "response for unconnected port"),
                }
            }
        }

        for c in 0..self.caches.len() {
            if let Some(BusPort { bus, port }) = self.caches[c].mem_side.peer() {
                if let Some(target) = self.buses.get_mut(bus) {
                    self.caches[c].send_outbound(now, |pkt| target.try_request(port, pkt, now));
                }
            }
            let responses = self.caches[c].tick(now);
            match self.caches[c].cpu_side.peer() {
                Some(Upstream::Core) => {
                    for pkt in responses {
                        self.core.receive(pkt, now);
                    }
                }
                Some(Upstream::Bus(bus)) => {
                    for pkt in responses {
                        if let Some(bus) = self.buses.get_mut(bus) {
                            let _ = bus.respond(pkt, now);
                        }
                    }
                }
                None => {}
            }
        }

        for pkt in self.memory.tick(now) {
            if let Some(bus) = self.buses.get_mut(self.memory_bus) {
                let _ = bus.respond(pkt, now);
            }
        }
        let intc_responses = self.interrupts.tick(now);
        if let Some(bus) = self.interrupts_bus.and_then(|b| self.buses.get_mut(b)) {
            for pkt in intc_responses {
                let _ = bus.respond(pkt, now);
            }
        }
    }

    /// Returns true while any cache, bus or memory-side target holds work.
    pub fn memory_busy(&self) -> bool {
        self.caches.iter().any(|c| c.busy())
            || self.buses.iter().any(SystemBus::busy)
            || self.memory.busy()
            || self.interrupts.busy()
    }

    /// Instruction cache.
    pub fn l1i(&self) -> &Cache {
        &self.caches[self.inst_cache]
    }

    /// Data cache.
    pub fn l1d(&self) -> &Cache {
        &self.caches[self.data_cache]
    }

    /// Untimed read of the newest copy of an 8-byte word: a resident cache line first
    /// (data cache outward), then DRAM. Writebacks still in flight are not seen.
    pub fn read_word(&self, addr: u64) -> u64 {
        let outer = (0..self.caches.len()).filter(|&c| c != self.data_cache && c != self.inst_cache);
        let bytes = std::iter::once(self.data_cache)
            .chain(outer)
            .find_map(|c| self.caches[c].peek(addr, 8))
            .unwrap_or_else(|| self.memory.peek(addr, 8));
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(word)
    }
}

/// Incrementally wires a [`System`].
#[derive(Debug, Default)]
pub struct SystemBuilder {
    core: Option<Core>,
    caches: Vec<Cache>,
    buses: Vec<SystemBus>,
    memory: Option<TimingMemory>,
    interrupts: Option<InterruptController>,
    memory_bus: Option<usize>,
    interrupts_bus: Option<usize>,
}

impl SystemBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the core.
    pub fn set_core(&mut self, core: Core) {
        self.core = Some(core);
    }

    /// Installs the DRAM channel.
    pub fn set_memory(&mut self, memory: TimingMemory) {
        self.memory = Some(memory);
    }

    /// Installs the interrupt controller.
    pub fn set_interrupts(&mut self, interrupts: InterruptController) {
        self.interrupts = Some(interrupts);
    }

    /// Adds a cache.
    pub fn add_cache(&mut self, cache: Cache) -> CacheId {
        self.caches.push(cache);
        CacheId(self.caches.len() - 1)
    }

    /// Adds a bus.
    pub fn add_bus(&mut self, bus: SystemBus) -> BusId {
        self.buses.push(bus);
        BusId(self.buses.len() - 1)
    }

    /// Connects the core's instruction port to `cache`.
    pub fn connect_core_inst(&mut self, cache: CacheId) {
        if let Some(core) = self.core.as_mut() {
            let _ = core.inst_port.connect(cache.0);
        }
        if let Some(c) = self.caches.get_mut(cache.0) {
            let _ = c.cpu_side.connect(Upstream::Core);
        }
    }

    /// Connects the core's data port to `cache`.
    pub fn connect_core_data(&mut self, cache: CacheId) {
        if let Some(core) = self.core.as_mut() {
            let _ = core.data_port.connect(cache.0);
        }
        if let Some(c) = self.caches.get_mut(cache.0) {
            let _ = c.cpu_side.connect(Upstream::Core);
        }
    }

    /// Connects the mem side of `cache` to a new cpu-side port of `bus`.
    pub fn connect_cache_to_bus(&mut self, cache: CacheId, bus: BusId) {
        let (Some(c), Some(b)) = (self.caches.get_mut(cache.0), self.buses.get_mut(bus.0)) else {
            return;
        };
        let port = b.add_cpu_port();
        let _ = b.connect_cpu_port(port, cache.0);
        let _ = c.mem_side.connect(BusPort { bus: bus.0, port });
    }

    /// Makes `cache` the default-route target of `bus`.
    pub fn connect_bus_to_cache(&mut self, bus: BusId, cache: CacheId) {
        let (Some(c), Some(b)) = (self.caches.get_mut(cache.0), self.buses.get_mut(bus.0)) else {
            return;
        };
        let _ = b.add_mem_port(Target::Cache(cache.0), None);
        let _ = c.cpu_side.connect(Upstream::Bus(bus.0));
    }

    /// Makes DRAM the default-route target of `bus`.
    pub fn connect_bus_to_memory(&mut self, bus: BusId) {
        if let Some(b) = self.buses.get_mut(bus.0) {
            let _ = b.add_mem_port(Target::Memory, None);
            self.memory_bus = Some(bus.0);
        }
    }

    /// Routes the interrupt controller's PIO window on `bus` to the controller.
    pub fn connect_bus_to_interrupts(&mut self, bus: BusId) {
        let Some(range) = self.interrupts.as_ref().map(InterruptController::range) else {
            return;
        };
        if let Some(b) = self.buses.get_mut(bus.0) {
            let _ = b.add_mem_port(Target::Interrupts, Some(range));
            self.interrupts_bus = Some(bus.0);
        }
    }

    /// Checks every mandatory link and returns the system.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] naming the first missing or
    /// contradictory link.
    pub fn build(self) -> Result<System, ConfigError> {
        let core = self
            .core
            .ok_or_else(|| ConfigError::invalid("system has no core"))?;
        let memory = self
            .memory
            .ok_or_else(|| ConfigError::invalid("system has no memory"))?;
        let interrupts = self
            .interrupts
            .ok_or_else(|| ConfigError::invalid("system has no interrupt controller"))?;
        core.validate()?;
        let inst_cache = core.inst_port.require()?;
        let data_cache = core.data_port.require()?;
        for idx in [inst_cache, data_cache] {
            if idx >= self.caches.len() {
                return Err(ConfigError::invalid(format!("core port names missing cache {idx}")));
            }
        }
        for cache in &self.caches {
            let _ = cache.cpu_side.require()?;
            let BusPort { bus, .. } = cache.mem_side.require()?;
            if bus >= self.buses.len() {
                return Err(ConfigError::invalid(format!(
                    "{} connects to missing bus {bus}",
                    cache.mem_side.name()
                )));
            }
        }
        for bus in &self.buses {
            bus.validate()?;
        }
        let memory_bus = self
            .memory_bus
            .ok_or_else(|| ConfigError::invalid("no bus routes to memory"))?;

        debug!(
            caches = self.caches.len(),
            buses = self.buses.len(),
            threads = core.threads().len(),
            "system built"
        );
        Ok(System {
            core,
            caches: self.caches,
            buses: self.buses,
            memory,
            interrupts,
            inst_cache,
            data_cache,
            memory_bus,
            interrupts_bus: self.interrupts_bus,
        })
    }
}
