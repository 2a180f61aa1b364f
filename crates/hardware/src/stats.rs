//! Simulation statistics collection and reporting.
//!
//! This module snapshots the counters kept by every component. It provides:
//! 1. **Summary:** Cycles, ticks, committed instructions and IPC.
//! 2. **Threads:** Per-thread instruction mix, run state and interrupt counts.
//! 3. **Branch prediction:** Resolved branches, mispredictions and squashed work.
//! 4. **Memory hierarchy:** Per-cache hit/miss/writeback/stall counts, bus grants and
//!    refusals, and DRAM traffic.

use std::io::{self, Write};

use crate::core::thread::{ThreadState, ThreadStats};
use crate::core::units::cache::CacheStats;
use crate::sim::clock::Clock;
use crate::soc::System;
use crate::soc::devices::interrupts::InterruptStats;
use crate::soc::interconnect::BusStats;
use crate::soc::memory::MemoryStats;
use crate::soc::traits::Responder;

/// Counters of one thread context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadSnapshot {
    /// Thread index.
    pub thread: usize,
    /// Run state.
    pub state: ThreadState,
    /// Pipeline counters.
    pub stats: ThreadStats,
}

/// Counters of one cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Cache name (`l1i`, `l1d`, `l2`).
    pub name: String,
    /// Counters.
    pub stats: CacheStats,
    /// Valid lines at snapshot time.
    pub valid_lines: usize,
}

/// Snapshot of every counter in the system.
#[derive(Clone, Debug, PartialEq)]
pub struct SimStats {
    /// Cycles simulated.
    pub cycles: u64,
    /// Simulated time in ticks.
    pub ticks: u64,
    /// Per-thread counters.
    pub threads: Vec<ThreadSnapshot>,
    /// Per-cache counters.
    pub caches: Vec<CacheSnapshot>,
    /// Per-bus counters, by name.
    pub buses: Vec<(String, BusStats)>,
    /// DRAM counters.
    pub memory: MemoryStats,
    /// Interrupt controller counters.
    pub interrupts: InterruptStats,
}

/// Valid section identifiers: `"summary"`, `"threads"`, `"branch"`, `"memory"`.
/// Pass an empty slice to `print_sections` to print all sections.
impl SimStats {
    /// Reads every counter from `system` at the time shown by `clock`.
    pub fn collect(system: &System, clock: &Clock) -> Self {
        Self {
            cycles: clock.cycle(),
            ticks: clock.tick(),
            threads: system
                .core
                .threads()
                .iter()
                .map(|ctx| ThreadSnapshot {
                    thread: ctx.id(),
                    state: ctx.state,
                    stats: ctx.stats.clone(),
                })
                .collect(),
            caches: system
                .caches
                .iter()
                .map(|c| CacheSnapshot {
                    name: c.name().to_string(),
                    stats: c.stats.clone(),
                    valid_lines: c.valid_lines(),
                })
                .collect(),
            buses: system
                .buses
                .iter()
                .map(|b| (b.name().to_string(), b.stats.clone()))
                .collect(),
            memory: system.memory.stats.clone(),
            interrupts: system.interrupts.stats.clone(),
        }
    }

    /// Instructions committed by all threads.
    pub fn committed(&self) -> u64 {
        self.threads.iter().map(|t| t.stats.committed).sum()
    }

    /// Committed instructions per cycle.
    pub fn ipc(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.committed() as f64 / self.cycles as f64
        }
    }

    /// Mispredictions over all threads.
    pub fn mispredicts(&self) -> u64 {
        self.threads.iter().map(|t| t.stats.mispredicts).sum()
    }

    /// Counters of the cache called `name`.
    pub fn cache(&self, name: &str) -> Option<&CacheStats> {
        self.caches.iter().find(|c| c.name == name).map(|c| &c.stats)
    }

    /// Writes the requested sections to `out`.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    pub fn write_sections(&self, out: &mut dyn Write, sections: &[String]) -> io::Result<()> {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let cyc = self.cycles.max(1) as f64;

        writeln!(out, "\n==========================================================")?;
        writeln!(out, "PIPELINE / MEMORY HIERARCHY SIMULATION STATISTICS")?;
        writeln!(out, "==========================================================")?;
        if want("summary") {
            writeln!(out, "sim_ticks                {}", self.ticks)?;
            writeln!(out, "sim_cycles               {}", self.cycles)?;
            writeln!(out, "sim_insts                {}", self.committed())?;
            writeln!(out, "sim_ipc                  {:.4}", self.ipc())?;
            writeln!(out, "----------------------------------------------------------")?;
        }
        if want("threads") {
            writeln!(out, "THREADS")?;
            for t in &self.threads {
                let s = &t.stats;
                writeln!(out, "  thread{}.state          {}", t.thread, t.state)?;
                writeln!(
                    out,
                    "  thread{}.committed      {} (ipc {:.4})",
                    t.thread,
                    s.committed,
                    s.committed as f64 / cyc
                )?;
                writeln!(out, "  thread{}.loads          {}", t.thread, s.loads)?;
                writeln!(out, "  thread{}.stores         {}", t.thread, s.stores)?;
                writeln!(out, "  thread{}.forwarded      {}", t.thread, s.forwarded_loads)?;
                writeln!(out, "  thread{}.interrupts     {}", t.thread, s.interrupts)?;
                writeln!(
                    out,
                    "  thread{}.stalls         fetch {} | data {} | store_buffer {}",
                    t.thread, s.fetch_stalls, s.data_stalls, s.store_buffer_stalls
                )?;
            }
            writeln!(out, "----------------------------------------------------------")?;
        }
        if want("branch") {
            let branches: u64 = self.threads.iter().map(|t| t.stats.branches).sum();
            let squashed: u64 = self.threads.iter().map(|t| t.stats.squashed).sum();
            let miss = self.mispredicts();
            let acc = if branches > 0 {
                100.0 * (branches.saturating_sub(miss) as f64 / branches as f64)
            } else {
                0.0
            };
            writeln!(out, "BRANCH PREDICTION")?;
            writeln!(out, "  bp.branches            {branches}")?;
            writeln!(out, "  bp.mispredicts         {miss}")?;
            writeln!(out, "  bp.accuracy            {acc:.2}%")?;
            writeln!(out, "  squashed               {squashed}")?;
            writeln!(out, "----------------------------------------------------------")?;
        }
        if want("memory") {
            writeln!(out, "MEMORY HIERARCHY")?;
            for c in &self.caches {
                let s = &c.stats;
                let total = s.hits + s.misses + s.merged;
                writeln!(
                    out,
                    "  {:<6} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}%",
                    c.name,
                    total,
                    s.hits,
                    if total > 0 { 100.0 - s.hit_rate() * 100.0 } else { 0.0 }
                )?;
                writeln!(
                    out,
                    "  {:<6} writebacks: {} | mshr_stalls: {} | target_stalls: {} | lines: {}",
                    c.name, s.writebacks, s.mshr_stalls, s.target_stalls, c.valid_lines
                )?;
            }
            for (name, b) in &self.buses {
                writeln!(
                    out,
                    "  {name:<6} grants: {} | refusals: {} | queue_full: {} | unmapped: {}",
                    b.grants, b.target_refusals, b.queue_full, b.unmapped
                )?;
            }
            let m = &self.memory;
            let served = m.reads + m.writes;
            let avg = if served > 0 {
                m.total_latency as f64 / served as f64
            } else {
                0.0
            };
            writeln!(
                out,
                "  dram   reads: {} | writes: {} | bytes: {} | avg_latency: {avg:.2} | faults: {}",
                m.reads, m.writes, m.bytes, m.faults
            )?;
            writeln!(
                out,
                "  intc   posted: {} | delivered: {} | pio: {}",
                self.interrupts.posted, self.interrupts.delivered, self.interrupts.pio_accesses
            )?;
        }
        writeln!(out, "==========================================================")
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = self.write_sections(&mut lock, sections);
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
