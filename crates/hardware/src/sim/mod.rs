//! Simulation driver.
//!
//! Provides the global clock with its timed event queue, and the simulator that
//! builds a system from a configuration and runs it to completion.

/// Global clock and delay queue.
pub mod clock;

/// Top-level simulator and run report.
pub mod simulator;

pub use simulator::{ExitCause, RunReport, Simulator, ThreadOutcome};
