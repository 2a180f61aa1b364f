//! Memory-side target interface.
//!
//! Every component that can sit behind a bus port (a cache's cpu side, the DRAM
//! channel, the interrupt controller) implements [`Responder`]. It provides:
//! 1. **Acceptance:** `try_request` either takes ownership of a packet or hands it back
//!    with a [`Backpressure`](crate::common::Backpressure) reason.
//! 2. **Progress:** `tick` returns the responses that became ready this cycle.

use crate::common::{Packet, Rejected};

/// A component that answers memory requests.
pub trait Responder {
    /// Short name used in logs and statistics (e.g. `"l1d"`, `"dram"`).
    fn name(&self) -> &str;

    /// Offers a request at cycle `now`.
    ///
    /// # Errors
    ///
    /// Returns the packet wrapped in [`Rejected`] when the target cannot accept it this
    /// cycle; the sender keeps it and retries later.
    fn try_request(&mut self, pkt: Packet, now: u64) -> Result<(), Rejected>;

    /// Returns the responses that are ready at cycle `now`.
    fn tick(&mut self, now: u64) -> Vec<Packet>;

    /// Returns true while requests are still being processed.
    fn busy(&self) -> bool;
}
