/// Single-thread runs: exits, faults, store-to-load forwarding and setup errors.
pub mod scenarios;

/// Multi-threaded runs sharing one pipeline and memory system.
pub mod smt;

/// Scheduled interrupts and handler delivery.
pub mod interrupts;
