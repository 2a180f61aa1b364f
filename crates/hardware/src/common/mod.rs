//! Common types shared by every component of the harness.
//!
//! This module provides the following:
//! 1. **Address Ranges:** Windows claimed by memory-side targets.
//! 2. **Packets:** Requests and responses exchanged through ports.
//! 3. **Ports:** Typed, single-peer connections used to wire the component graph.
//! 4. **Error Handling:** Configuration errors, access faults, thread faults and backpressure.

/// Address range type.
pub mod addr;

/// Error, fault and backpressure definitions.
pub mod error;

/// Memory request/response packets.
pub mod packet;

/// Typed component connections.
pub mod port;

pub use addr::AddrRange;
pub use error::{AccessFault, Backpressure, ConfigError, LoadError, Rejected, ThreadFault};
pub use packet::{MemCmd, Packet, PacketId, PacketIdGen};
pub use port::Port;
