use pipesim_core::common::{Packet, PacketIdGen, Rejected};
use pipesim_core::config::{CacheConfig, Config};
use pipesim_core::core::units::cache::Cache;
use pipesim_core::isa::Program;
use pipesim_core::soc::memory::TimingMemory;
use pipesim_core::soc::memory::controller::SimpleController;
use pipesim_core::soc::traits::Responder;
use pipesim_core::{RunReport, Simulator};
use tracing_subscriber::EnvFilter;

use crate::common::mocks::loader::MapLoader;

/// Installs a test-writer subscriber once; honours `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A simulator whose workloads are named `t0`, `t1`, ... in thread order.
#[derive(Debug)]
pub struct TestContext {
    /// The simulator under test.
    pub sim: Simulator,
}

impl TestContext {
    /// Builds a simulator running `programs`, one per thread, under `config`.
    ///
    /// `config.workload_paths` is replaced by `t0..tN`.
    pub fn new(mut config: Config, programs: Vec<Program>) -> Self {
        init_logging();
        let mut loader = MapLoader::new();
        config.workload_paths.clear();
        for (i, program) in programs.into_iter().enumerate() {
            let name = format!("t{i}");
            config.workload_paths.push(pipesim_core::Workload::new(name.as_str()));
            loader = loader.with(&name, program);
        }
        let sim = Simulator::new(config, &loader).unwrap();
        Self { sim }
    }

    /// Runs to completion.
    pub fn run(&mut self) -> RunReport {
        self.sim.run()
    }

    /// Writes `value` to memory before the run.
    pub fn poke_word(&mut self, addr: u64, value: u64) {
        self.sim
            .system_mut()
            .memory
            .poke(addr, &value.to_le_bytes());
    }
}

/// One cache in front of a fixed-latency memory, driven cycle by cycle.
#[derive(Debug)]
pub struct CacheRig {
    /// The cache under test.
    pub cache: Cache,
    /// Backing memory behind the cache's outbound port.
    pub memory: TimingMemory,
    /// Current cycle.
    pub now: u64,
    ids: PacketIdGen,
}

impl CacheRig {
    /// Builds a cache from `config` over 1 MiB of memory that answers after
    /// `memory_latency` cycles.
    pub fn new(config: &CacheConfig, memory_latency: u64) -> Self {
        Self {
            cache: Cache::new("l1d", 2, config, 7),
            memory: TimingMemory::new(
                1 << 20,
                Box::new(SimpleController::new(memory_latency)),
                64,
            ),
            now: 0,
            ids: PacketIdGen::new(0),
        }
    }

    /// A fresh 8-byte read of `addr`.
    pub fn read(&mut self, addr: u64) -> Packet {
        Packet::read(self.ids.next_id(), addr, 8)
    }

    /// A fresh 8-byte write of `value` to `addr`.
    pub fn write(&mut self, addr: u64, value: u64) -> Packet {
        Packet::write(self.ids.next_id(), addr, value.to_le_bytes().to_vec())
    }

    /// Offers `pkt` to the cache at the current cycle.
    pub fn offer(&mut self, pkt: Packet) -> Result<(), Rejected> {
        self.cache.try_request(pkt, self.now)
    }

    /// Advances one cycle and returns the responses the cache produced.
    pub fn step(&mut self) -> Vec<Packet> {
        let now = self.now;
        let memory = &mut self.memory;
        self.cache
            .send_outbound(now, |pkt| memory.try_request(pkt, now));
        for rsp in self.memory.tick(now) {
            self.cache.receive_response(rsp, now);
        }
        let out = self.cache.tick(now);
        self.now += 1;
        out
    }

    /// Steps until the cache is idle, collecting every response.
    pub fn drain(&mut self) -> Vec<Packet> {
        let mut out = Vec::new();
        for _ in 0..10_000 {
            out.extend(self.step());
            if !self.cache.busy() && !self.memory.busy() {
                break;
            }
        }
        out
    }

    /// Performs a blocking access and returns its response.
    pub fn access(&mut self, pkt: Packet) -> Packet {
        let id = pkt.id;
        self.offer(pkt).unwrap();
        self.drain().into_iter().find(|p| p.id == id).unwrap()
    }
}
