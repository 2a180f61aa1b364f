//! Execution units and functional components.
//!
//! This module contains the branch prediction unit and the cache model that the
//! core's instruction and data ports (and the optional L2) are built from.

/// Branch prediction unit (`Null` and `Local` direction predictors).
pub mod bru;

/// Non-blocking set-associative caches with MSHRs and replacement policies.
pub mod cache;
