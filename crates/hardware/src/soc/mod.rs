//! System-on-Chip (SoC) Components.
//!
//! This module organizes the components behind the core: the system buses, the
//! DRAM channel, the interrupt controller, and the builder that wires them.

/// System builder and the top-level `System`.
pub mod builder;

/// Interrupt controller.
pub mod devices;

/// System bus interconnect and routing.
pub mod interconnect;

/// DRAM channel and memory controllers.
pub mod memory;

/// Memory-side target trait.
pub mod traits;

pub use builder::{System, SystemBuilder};
