//! Hardware thread contexts.
//!
//! A [`ThreadContext`] holds the architectural state of one SMT thread: the
//! register file, the commit PC, the interrupt return PC and the program it
//! runs. Speculative state lives in the thread's pipeline, never here.

use std::fmt;

use crate::common::ThreadFault;
use crate::isa::{NUM_REGS, Program, Reg, Workload};

/// Run state of a thread context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThreadState {
    /// No workload assigned.
    #[default]
    Idle,
    /// Fetching and committing instructions.
    Running,
    /// Committed an `exit`.
    Exited {
        /// Value of the exit register.
        code: u64,
        /// Cycle of the commit.
        cycle: u64,
    },
    /// Terminated by an illegal access.
    Faulted {
        /// The fault.
        fault: ThreadFault,
        /// Cycle the fault was taken.
        cycle: u64,
    },
}

impl ThreadState {
    /// Returns true once the thread has exited or faulted.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited { .. } | Self::Faulted { .. })
    }

    /// Returns true while the thread is running.
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Exited { code, cycle } => write!(f, "exited with code {code} at cycle {cycle}"),
            Self::Faulted { fault, cycle } => write!(f, "{fault} (cycle {cycle})"),
        }
    }
}

/// Per-thread pipeline counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThreadStats {
    /// Instructions committed.
    pub committed: u64,
    /// Instructions delivered by fetch.
    pub fetched: u64,
    /// Instruction cache requests sent.
    pub fetch_requests: u64,
    /// Committed loads.
    pub loads: u64,
    /// Committed stores.
    pub stores: u64,
    /// Committed conditional branches.
    pub branches: u64,
    /// Conditional branches resolved against their prediction.
    pub mispredicts: u64,
    /// Instructions discarded by mispredictions, interrupts and termination.
    pub squashed: u64,
    /// Interrupts delivered.
    pub interrupts: u64,
    /// Loads satisfied from an older store.
    pub forwarded_loads: u64,
    /// Instruction cache requests refused.
    pub fetch_stalls: u64,
    /// Data cache requests refused (loads and store drains).
    pub data_stalls: u64,
    /// Commit cycles lost to a full store buffer.
    pub store_buffer_stalls: u64,
}

/// Architectural state of one hardware thread.
#[derive(Clone, Debug)]
pub struct ThreadContext {
    id: usize,
    regs: [u64; NUM_REGS],
    /// Fetch address of the next instruction to commit.
    pub commit_pc: u64,
    /// Saved return PC while the interrupt handler runs.
    pub epc: u64,
    /// True between interrupt delivery and `iret`.
    pub in_handler: bool,
    program: Option<Program>,
    workload: Option<Workload>,
    /// Run state.
    pub state: ThreadState,
    /// Counters.
    pub stats: ThreadStats,
}

impl ThreadContext {
    /// Creates an idle context.
    pub const fn new(id: usize) -> Self {
        Self {
            id,
            regs: [0; NUM_REGS],
            commit_pc: 0,
            epc: 0,
            in_handler: false,
            program: None,
            workload: None,
            state: ThreadState::Idle,
            stats: ThreadStats {
                committed: 0,
                fetched: 0,
                fetch_requests: 0,
                loads: 0,
                stores: 0,
                branches: 0,
                mispredicts: 0,
                squashed: 0,
                interrupts: 0,
                forwarded_loads: 0,
                fetch_stalls: 0,
                data_stalls: 0,
                store_buffer_stalls: 0,
            },
        }
    }

    /// Thread index.
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Assigns a workload, applies the program's initial registers and starts running.
    pub fn start(&mut self, workload: Workload, program: Program) {
        self.regs = [0; NUM_REGS];
        for &(reg, value) in &program.init_regs {
            self.write_reg(reg, value);
        }
        self.commit_pc = program.entry_pc();
        self.epc = 0;
        self.in_handler = false;
        self.program = Some(program);
        self.workload = Some(workload);
        self.state = ThreadState::Running;
    }

    /// Reads a register; `r0` is always zero.
    #[inline]
    pub fn read_reg(&self, reg: Reg) -> u64 {
        self.regs.get(reg as usize).copied().unwrap_or(0)
    }

    /// Writes a register; writes to `r0` are discarded.
    #[inline]
    pub fn write_reg(&mut self, reg: Reg, value: u64) {
        if reg == 0 {
            return;
        }
        if let Some(slot) = self.regs.get_mut(reg as usize) {
            *slot = value;
        }
    }

    /// The whole register file.
    pub const fn regs(&self) -> &[u64; NUM_REGS] {
        &self.regs
    }

    /// The assigned program.
    pub const fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// The assigned workload.
    pub const fn workload(&self) -> Option<&Workload> {
        self.workload.as_ref()
    }

    /// Returns true while the thread is running.
    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Exit code, once the thread has exited.
    pub const fn exit_code(&self) -> Option<u64> {
        match self.state {
            ThreadState::Exited { code, .. } => Some(code),
            _ => None,
        }
    }
}
