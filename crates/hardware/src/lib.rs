//! Parameterized pipeline / memory-hierarchy simulation library.
//!
//! This crate builds and runs a cycle-level model of a small multi-threaded system:
//! 1. **Core:** In-order or out-of-order pipeline, `Null` or `Local` branch prediction,
//!    configurable widths and 1..K SMT thread contexts.
//! 2. **Memory:** Set-associative L1I/L1D caches with MSHRs, an optional L2, buses and a
//!    DRAM channel.
//! 3. **ISA:** A small micro-instruction set that workloads are expressed in.
//! 4. **SoC:** Interconnect, DRAM timing, interrupt controller and the system builder.
//! 5. **Simulation:** Configuration, global clock, run loop and statistics.
//!
//! Workload loading is an external concern: callers supply a [`WorkloadLoader`].

/// Common types (addresses, packets, ports, errors).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// CPU core (thread contexts, pipeline, branch predictors, caches).
pub mod core;
/// Micro-instruction set and program representation.
pub mod isa;
/// Clock and simulation driver.
pub mod sim;
/// System-on-chip (builder, bus, interrupt controller, memory).
pub mod soc;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Workload collaborator interface and the programs it produces.
pub use crate::isa::{Program, Workload, WorkloadLoader};
/// Simulation driver and its report.
pub use crate::sim::{ExitCause, RunReport, Simulator};
/// Top-level system; construct with `System::from_config` or a `SystemBuilder`.
pub use crate::soc::{System, SystemBuilder};
/// Statistics snapshot.
pub use crate::stats::SimStats;
