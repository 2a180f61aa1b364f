//! Workload instruction set.
//!
//! This module provides:
//! 1. **Instructions:** The micro-instruction set executed by the core model.
//! 2. **Programs:** Per-thread instruction streams with entry, handler and initial registers.
//! 3. **Workloads:** Configuration-level executables and the loader trait that resolves them.

/// Micro-instruction definitions.
pub mod instruction;

/// Programs, workloads and the loader seam.
pub mod program;

pub use instruction::{INST_BYTES, InstClass, Instruction, NUM_REGS, Reg, WORD_BYTES};
pub use program::{Program, Workload, WorkloadLoader};
