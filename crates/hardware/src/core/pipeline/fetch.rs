//! Fetch Stage: fetch-group formation and branch prediction.
//!
//! Each request reads up to `fetchWidth` consecutive instructions that lie in one
//! instruction-cache line. When the line arrives the group is cut at the first
//! control transfer the predictor follows:
//! 1. **Jumps:** Fetch continues at the target.
//! 2. **Conditional Branches:** Fetch follows the predicted direction; with no
//!    prediction it stops until the branch resolves.
//! 3. **`iret`/`exit`:** Fetch stops until commit redirects it.

use std::collections::VecDeque;

use crate::common::{PacketId, ThreadFault};
use crate::core::pipeline::rob::DynInst;
use crate::core::units::bru::{BranchPredictor, BranchPredictorWrapper};
use crate::isa::{INST_BYTES, Instruction, Program};

/// Per-thread fetch state and the fetch buffer.
#[derive(Clone, Debug)]
pub struct FetchUnit {
    /// Next fetch address.
    pub pc: u64,
    pending: Option<PacketId>,
    stale: bool,
    blocked_on: Option<u64>,
    halted: bool,
    buffer: VecDeque<DynInst>,
    width: usize,
}

impl FetchUnit {
    /// Creates an idle fetch unit delivering `width` instructions per group.
    pub fn new(width: usize) -> Self {
        Self {
            pc: 0,
            pending: None,
            stale: false,
            blocked_on: None,
            halted: true,
            buffer: VecDeque::with_capacity(2 * width),
            width,
        }
    }

    /// Starts fetching at `pc`, dropping anything fetched from the old path.
    ///
    /// # Returns
    ///
    /// The number of buffered instructions discarded.
    pub fn redirect(&mut self, pc: u64) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.pc = pc;
        self.blocked_on = None;
        self.halted = false;
        self.stale = self.pending.is_some();
        dropped
    }

    /// Stops fetching for good, dropping buffered instructions.
    pub fn stop(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.halted = true;
        self.blocked_on = None;
        self.stale = self.pending.is_some();
        dropped
    }

    /// Returns true if a new request may be sent this cycle.
    pub fn can_fetch(&self) -> bool {
        self.pending.is_none()
            && self.blocked_on.is_none()
            && !self.halted
            && self.buffer.len() + self.width <= 2 * self.width
    }

    /// Returns true while fetch waits for the branch with sequence number `seq`.
    pub fn is_blocked_on(&self, seq: u64) -> bool {
        self.blocked_on == Some(seq)
    }

    /// Records the id of the request just sent.
    pub const fn set_pending(&mut self, id: PacketId) {
        self.pending = Some(id);
    }

    /// Number of instructions the next request covers.
    ///
    /// # Arguments
    ///
    /// * `program` - The thread's program; the group never runs past its end.
    /// * `line_bytes` - Instruction cache line size; the group never crosses a line.
    pub fn group_len(&self, program: &Program, line_bytes: u64) -> usize {
        let line_end = (self.pc | (line_bytes - 1)) + 1;
        let in_line = ((line_end - self.pc) / INST_BYTES).max(1) as usize;
        let remaining = program
            .index_of(self.pc)
            .map_or(1, |i| program.instructions.len() - i);
        self.width.min(in_line).min(remaining)
    }

    /// Queues a placeholder that faults at commit and stops fetching.
    pub fn push_fault(&mut self, seq: u64, fault: ThreadFault, now: u64) {
        self.buffer.push_back(DynInst::faulted(seq, self.pc, fault, now + 1));
        self.halted = true;
    }

    /// Accepts the response to the outstanding request.
    ///
    /// # Arguments
    ///
    /// * `id` - Response id.
    /// * `count` - Instructions covered by the request.
    /// * `program` - The thread's program.
    /// * `predictor` - The thread's direction predictor.
    /// * `next_seq` - The thread's sequence counter.
    /// * `now` - Current cycle; instructions may decode from the next cycle.
    ///
    /// # Returns
    ///
    /// The number of instructions delivered, or `None` if the response belonged to a
    /// path abandoned since the request.
    pub fn accept(
        &mut self,
        id: PacketId,
        count: usize,
        program: &Program,
        predictor: &BranchPredictorWrapper,
        next_seq: &mut u64,
        now: u64,
    ) -> Option<usize> {
        if self.pending != Some(id) {
            return None;
        }
        self.pending = None;
        if std::mem::take(&mut self.stale) || self.halted {
            return None;
        }

        let mut pc = self.pc;
        let mut delivered = 0;
        for _ in 0..count {
            let Some(inst) = program.fetch(pc) else {
                break;
            };
            let seq = *next_seq;
            *next_seq += 1;
            let mut d = DynInst::new(seq, pc, inst, now + 1);
            d.target_pc = inst.target().map(|t| program.pc_of(t));
            delivered += 1;

            if inst.is_cond_branch() {
                d.predicted = predictor.predict(pc);
                match d.predicted {
                    None => {
                        self.blocked_on = Some(seq);
                        self.buffer.push_back(d);
                        return Some(delivered);
                    }
                    Some(true) => {
                        pc = d.target_pc.unwrap_or(pc + INST_BYTES);
                        self.buffer.push_back(d);
                        break;
                    }
                    Some(false) => {
                        pc += INST_BYTES;
                        self.buffer.push_back(d);
                    }
                }
                continue;
            }

            match inst {
                Instruction::J { .. } => {
                    pc = d.target_pc.unwrap_or(pc + INST_BYTES);
                    self.buffer.push_back(d);
                    break;
                }
                Instruction::Iret | Instruction::Exit { .. } => {
                    self.halted = true;
                    self.buffer.push_back(d);
                    return Some(delivered);
                }
                _ => {
                    pc += INST_BYTES;
                    self.buffer.push_back(d);
                }
            }
        }
        self.pc = pc;
        Some(delivered)
    }

    /// Marks the outstanding request failed: the group start faults at commit.
    pub fn fail(&mut self, id: PacketId, seq: u64, fault: ThreadFault, now: u64) -> bool {
        if self.pending != Some(id) {
            return false;
        }
        self.pending = None;
        if std::mem::take(&mut self.stale) || self.halted {
            return false;
        }
        self.push_fault(seq, fault, now);
        true
    }

    /// Removes the oldest buffered instruction that has been in the buffer a cycle.
    pub fn pop_ready(&mut self, now: u64) -> Option<DynInst> {
        if self.buffer.front().is_some_and(|d| d.ready_at <= now) {
            self.buffer.pop_front()
        } else {
            None
        }
    }

    /// Puts back an instruction [`pop_ready`](Self::pop_ready) returned.
    pub fn requeue(&mut self, d: DynInst) {
        self.buffer.push_front(d);
    }

    /// Buffered instruction count.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
