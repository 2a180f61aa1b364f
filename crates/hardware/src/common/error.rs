//! Error and fault definitions.
//!
//! This module defines every failure the harness can report. It provides:
//! 1. **Configuration Errors:** Fatal problems detected before the first cycle.
//! 2. **Access Faults:** Carried inside response packets by memory-side targets.
//! 3. **Thread Faults:** Terminate a single hardware thread; the others keep running.
//! 4. **Backpressure:** Recoverable refusals that the sender retries on a later cycle.

use thiserror::Error;

use super::packet::Packet;

/// Errors raised while validating configuration, wiring components or loading workloads.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter is out of range or a mandatory connection is missing.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// The number of workloads does not fit the number of thread contexts.
    #[error("workload count mismatch: {threads} thread context(s) but {workloads} workload(s)")]
    WorkloadCountMismatch {
        /// Configured hardware thread count.
        threads: usize,
        /// Number of workloads supplied.
        workloads: usize,
    },

    /// The workload loader failed.
    #[error(transparent)]
    Workload(#[from] LoadError),

    /// The configuration document could not be parsed.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidConfiguration`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// Errors produced by a workload loader.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The workload could not be read.
    #[error("cannot read workload {path}: {reason}")]
    Unreadable {
        /// Workload path.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// The workload text is malformed.
    #[error("{path}:{line}: {reason}")]
    Syntax {
        /// Workload path.
        path: String,
        /// 1-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// The workload contains no instructions.
    #[error("workload {path} contains no instructions")]
    Empty {
        /// Workload path.
        path: String,
    },
}

/// Faults reported by memory-side targets in a response packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AccessFault {
    /// The access falls outside the memory model's address range.
    #[error("access of {size} byte(s) at {addr:#x} is outside memory")]
    OutOfRangeAccess {
        /// Faulting address.
        addr: u64,
        /// Access size in bytes.
        size: usize,
    },

    /// No bus target claims the address.
    #[error("no target mapped at {addr:#x}")]
    Unmapped {
        /// Faulting address.
        addr: u64,
    },

    /// The access is not naturally aligned or crosses a line boundary.
    #[error("misaligned access of {size} byte(s) at {addr:#x}")]
    Misaligned {
        /// Faulting address.
        addr: u64,
        /// Access size in bytes.
        size: usize,
    },
}

impl AccessFault {
    /// Returns the address that caused the fault.
    pub const fn addr(&self) -> u64 {
        match *self {
            Self::OutOfRangeAccess { addr, .. }
            | Self::Unmapped { addr }
            | Self::Misaligned { addr, .. } => addr,
        }
    }
}

/// Faults that terminate a single hardware thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ThreadFault {
    /// An instruction performed an illegal memory access.
    #[error("segmentation fault at pc {pc:#x}: {cause}")]
    SegmentationFault {
        /// Fetch address of the faulting instruction.
        pc: u64,
        /// The access fault reported by the memory system.
        cause: AccessFault,
    },

    /// Control flow left the program text.
    #[error("segmentation fault: fetch outside program text at pc {pc:#x}")]
    FetchOutOfBounds {
        /// The out-of-bounds program counter.
        pc: u64,
    },
}

/// Recoverable reasons for refusing a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Backpressure {
    /// All MSHRs are allocated.
    #[error("no free MSHR")]
    MshrExhausted,
    /// The matching MSHR already holds its maximum number of targets.
    #[error("MSHR target list full")]
    TargetsExhausted,
    /// The block is still in the writeback buffer.
    #[error("writeback of block pending")]
    WritebackPending,
    /// A bounded queue is full.
    #[error("queue full")]
    QueueFull,
    /// The target has reached its in-flight limit.
    #[error("target busy")]
    Busy,
}

/// A refused request, handed back to the sender for a later retry.
#[derive(Debug, Error)]
#[error("request {id} refused: {reason}", id = .packet.id)]
pub struct Rejected {
    /// The packet, returned unchanged.
    pub packet: Packet,
    /// Why it was refused.
    pub reason: Backpressure,
}

impl Rejected {
    /// Wraps a refused packet.
    pub const fn new(packet: Packet, reason: Backpressure) -> Self {
        Self { packet, reason }
    }
}
