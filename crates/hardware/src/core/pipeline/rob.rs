//! Reorder Buffer (ROB) for in-order commit.
//!
//! The ROB tracks one thread's instructions from dispatch through commit. It provides:
//! 1. **Allocation:** Instructions enter at the tail in program order.
//! 2. **Forwarding:** The most recent in-flight producer of a register supplies its value.
//! 3. **Disambiguation:** Loads look back for older stores to the same address.
//! 4. **In-order Commit:** Instructions retire from the head.
//! 5. **Flush:** Squashes everything younger than a resolved branch.

use std::collections::VecDeque;

use crate::common::ThreadFault;
use crate::isa::{INST_BYTES, Instruction, Reg};

/// Lifecycle state of an in-flight instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstState {
    /// Dispatched, operands not yet read.
    Waiting,
    /// In a functional unit until `done_at`.
    Executing {
        /// Cycle the result becomes available.
        done_at: u64,
    },
    /// Load waiting for the data cache.
    Memory,
    /// Result available; may commit.
    Complete,
}

/// A dynamic instance of an instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynInst {
    /// Per-thread sequence number, increasing in fetch order.
    pub seq: u64,
    /// Fetch address.
    pub pc: u64,
    /// The instruction.
    pub inst: Instruction,
    /// Lifecycle state.
    pub state: InstState,
    /// First cycle the instruction may advance to the next stage.
    pub ready_at: u64,
    /// Destination value, exit code or store data.
    pub result: u64,
    /// Effective address of a load or store, once computed.
    pub addr: Option<u64>,
    /// Fetch address of the branch/jump target.
    pub target_pc: Option<u64>,
    /// Direction fetch followed; `None` when fetch stopped behind the branch.
    pub predicted: Option<bool>,
    /// Resolved direction.
    pub taken: bool,
    /// Fault raised when the instruction commits.
    pub fault: Option<ThreadFault>,
}

impl DynInst {
    /// Creates a freshly fetched instruction.
    pub const fn new(seq: u64, pc: u64, inst: Instruction, ready_at: u64) -> Self {
        Self {
            seq,
            pc,
            inst,
            state: InstState::Waiting,
            ready_at,
            result: 0,
            addr: None,
            target_pc: None,
            predicted: None,
            taken: false,
            fault: None,
        }
    }

    /// Creates a placeholder that faults as soon as it reaches commit.
    pub const fn faulted(seq: u64, pc: u64, fault: ThreadFault, ready_at: u64) -> Self {
        let mut d = Self::new(seq, pc, Instruction::Nop, ready_at);
        d.state = InstState::Complete;
        d.fault = Some(fault);
        d
    }

    /// Address of the next instruction in program order once resolved.
    pub fn next_pc(&self) -> u64 {
        let fallthrough = self.pc + INST_BYTES;
        match self.inst {
            Instruction::J { .. } => self.target_pc.unwrap_or(fallthrough),
            _ if self.inst.is_cond_branch() && self.taken => self.target_pc.unwrap_or(fallthrough),
            _ => fallthrough,
        }
    }
}

/// Operand lookup result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// An in-flight producer has the value.
    Forwarded(u64),
    /// An in-flight producer has not finished.
    Pending,
    /// No in-flight producer; read the register file.
    Architectural,
}

/// Outcome of searching older stores for a load address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreSearch {
    /// An older store has not computed its address yet.
    Unresolved,
    /// The youngest older store to the address holds this value.
    Forward(u64),
    /// No older in-flight store matches.
    Clear,
}

/// Per-thread reorder buffer.
#[derive(Clone, Debug)]
pub struct Rob {
    entries: VecDeque<DynInst>,
    capacity: usize,
}

impl Rob {
    /// Creates an empty ROB with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the ROB capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of occupied entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the ROB is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if no entry can be allocated.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Appends an instruction at the tail. Returns it back when full.
    ///
    /// # Errors
    ///
    /// Returns the instruction unchanged if the ROB is full.
    pub fn allocate(&mut self, inst: DynInst) -> Result<(), DynInst> {
        if self.is_full() {
            return Err(inst);
        }
        self.entries.push_back(inst);
        Ok(())
    }

    /// Oldest entry.
    pub fn head(&self) -> Option<&DynInst> {
        self.entries.front()
    }

    /// Removes the oldest entry.
    pub fn pop_head(&mut self) -> Option<DynInst> {
        self.entries.pop_front()
    }

    /// Entry at position `idx` (0 is the head).
    pub fn get(&self, idx: usize) -> Option<&DynInst> {
        self.entries.get(idx)
    }

    /// Mutable entry at position `idx`.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut DynInst> {
        self.entries.get_mut(idx)
    }

    /// Mutable entry with sequence number `seq`.
    pub fn find_mut(&mut self, seq: u64) -> Option<&mut DynInst> {
        let idx = self.entries.binary_search_by_key(&seq, |e| e.seq).ok()?;
        self.entries.get_mut(idx)
    }

    /// Iterates from oldest to youngest.
    pub fn iter(&self) -> impl Iterator<Item = &DynInst> {
        self.entries.iter()
    }

    /// Value of `reg` as seen by the entry at `idx`.
    pub fn operand(&self, idx: usize, reg: Reg) -> Operand {
        if reg == 0 {
            return Operand::Forwarded(0);
        }
        let producer = self
            .entries
            .range(..idx)
            .rev()
            .find(|e| e.inst.dest() == Some(reg));
        match producer {
            None => Operand::Architectural,
            Some(e) if e.state == InstState::Complete && e.fault.is_none() => {
                Operand::Forwarded(e.result)
            }
            Some(_) => Operand::Pending,
        }
    }

    /// Searches the stores older than `idx` for `addr`, youngest first.
    pub fn search_stores(&self, idx: usize, addr: u64) -> StoreSearch {
        for e in self.entries.range(..idx).rev() {
            if !matches!(e.inst, Instruction::Sd { .. }) {
                continue;
            }
            match e.addr {
                None => return StoreSearch::Unresolved,
                Some(a) if a == addr => return StoreSearch::Forward(e.result),
                Some(_) => {}
            }
        }
        StoreSearch::Clear
    }

    /// Squashes every entry younger than `seq`.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    pub fn flush_after(&mut self, seq: u64) -> usize {
        let keep = self.entries.partition_point(|e| e.seq <= seq);
        let removed = self.entries.len() - keep;
        self.entries.truncate(keep);
        removed
    }

    /// Squashes every entry.
    pub fn flush_all(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }
}
