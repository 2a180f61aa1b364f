//! Bus-attached devices.

/// Per-thread interrupt controller.
pub mod interrupts;

pub use interrupts::{Interrupt, InterruptClass, InterruptController};
