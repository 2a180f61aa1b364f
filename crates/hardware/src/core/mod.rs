//! Core pipeline model.
//!
//! The [`Core`] runs 1..K hardware threads through Fetch, Decode, Dispatch
//! (out-of-order only), Execute, Writeback and Commit. Each cycle the stages
//! are evaluated back to front so an instruction advances at most one stage:
//! 1. **Writeback:** Finished instructions complete; branches resolve.
//! 2. **Commit:** Interrupt delivery, then in-order retirement from each ROB.
//! 3. **Store Drain:** One committed store per thread goes to the data cache.
//! 4. **Issue:** In program order (in-order) or oldest-ready-first (out-of-order).
//! 5. **Dispatch / Decode:** Into the ROB.
//! 6. **Fetch:** One thread per cycle, round-robin.
//!
//! The core never owns caches. Requests leave through [`CoreMemory`]; responses
//! come back through [`Core::receive`].

/// Per-thread pipeline structures (fetch unit, ROB, store buffer).
pub mod pipeline;

/// Hardware thread contexts.
pub mod thread;

/// Execution units (branch predictors, caches).
pub mod units;

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use self::pipeline::{InstState, Operand, StoreSearch, ThreadPipeline};
use self::thread::{ThreadContext, ThreadState};
use self::units::bru::BranchPredictor;
use crate::common::{
    AccessFault, ConfigError, Packet, PacketId, PacketIdGen, Port, Rejected, ThreadFault,
};
use crate::config::{CoreConfig, CoreType};
use crate::isa::{INST_BYTES, InstClass, Instruction, Program, WORD_BYTES, Workload};
use crate::soc::devices::InterruptController;

/// Which L1 a core request goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CorePort {
    /// Instruction cache.
    Inst,
    /// Data cache.
    Data,
}

/// The memory system as seen from the core's two ports.
pub trait CoreMemory {
    /// Offers a request to the cache behind `port`.
    ///
    /// # Errors
    ///
    /// Returns the packet with a backpressure reason; the core retries later.
    fn send(&mut self, port: CorePort, pkt: Packet, now: u64) -> Result<(), Rejected>;
}

/// What an outstanding core request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Inflight {
    Fetch { thread: usize, count: usize },
    Load { thread: usize, seq: u64 },
    Store { thread: usize },
}

/// Outcome of trying to start one instruction.
enum Issue {
    Started,
    Blocked,
    Load { addr: u64 },
}

/// Multi-threaded pipelined core.
#[derive(Debug)]
pub struct Core {
    kind: CoreType,
    fetch_width: usize,
    dispatch_width: usize,
    issue_width: usize,
    commit_width: usize,
    line_bytes: u64,
    threads: Vec<ThreadContext>,
    pipes: Vec<ThreadPipeline>,
    inflight: HashMap<PacketId, Inflight>,
    ids: PacketIdGen,
    fetch_rr: usize,
    issue_rr: usize,
    commit_rr: usize,
    /// Instruction cache index.
    pub inst_port: Port<usize>,
    /// Data cache index.
    pub data_port: Port<usize>,
}

impl Core {
    /// Creates a core with `config.thread_count` idle threads.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated core parameters.
    /// * `origin` - Packet origin id of the core.
    /// * `inst_line_bytes` - Instruction cache line size; fetch groups never cross a line.
    pub fn new(config: &CoreConfig, origin: u32, inst_line_bytes: usize) -> Self {
        let threads = config.thread_count.max(1);
        Self {
            kind: config.core_type,
            fetch_width: config.fetch_width,
            dispatch_width: config.dispatch_width,
            issue_width: config.issue_width,
            commit_width: config.commit_width,
            line_bytes: inst_line_bytes.max(WORD_BYTES) as u64,
            threads: (0..threads).map(ThreadContext::new).collect(),
            pipes: (0..threads).map(|_| ThreadPipeline::new(config)).collect(),
            inflight: HashMap::new(),
            ids: PacketIdGen::new(origin),
            fetch_rr: 0,
            issue_rr: 0,
            commit_rr: 0,
            inst_port: Port::new("core.icache_port"),
            data_port: Port::new("core.dcache_port"),
        }
    }

    /// Checks that both cache ports are connected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] naming the missing port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let _ = self.inst_port.require()?;
        let _ = self.data_port.require()?;
        Ok(())
    }

    /// Pipeline organisation.
    pub const fn kind(&self) -> CoreType {
        self.kind
    }

    /// Thread contexts.
    pub fn threads(&self) -> &[ThreadContext] {
        &self.threads
    }

    /// Thread context `t`.
    pub fn thread(&self, t: usize) -> Option<&ThreadContext> {
        self.threads.get(t)
    }

    /// Assigns a program to thread `t` and starts fetching at its entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if `t` does not exist.
    pub fn start_thread(
        &mut self,
        t: usize,
        workload: Workload,
        program: Program,
    ) -> Result<(), ConfigError> {
        let (Some(ctx), Some(pipe)) = (self.threads.get_mut(t), self.pipes.get_mut(t)) else {
            return Err(ConfigError::invalid(format!("thread {t} does not exist")));
        };
        let entry = program.entry_pc();
        debug!(thread = t, workload = %workload.path, entry, "thread started");
        ctx.start(workload, program);
        let _ = pipe.flush_to(entry);
        Ok(())
    }

    /// Returns true once no thread is running and every committed store has drained.
    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|t| !t.is_running())
            && self.pipes.iter().all(|p| p.store_buffer.is_empty())
    }

    /// Outstanding cache requests of the core.
    pub fn outstanding(&self) -> usize {
        self.inflight.len()
    }

    /// Advances every stage by one cycle.
    pub fn tick(&mut self, now: u64, mem: &mut dyn CoreMemory, intc: &mut InterruptController) {
        for t in 0..self.threads.len() {
            self.writeback(t, now);
        }
        self.commit(now, intc);
        for t in 0..self.threads.len() {
            self.drain_store(t, now, mem);
        }
        self.issue(now, mem);
        self.dispatch(now);
        self.fetch(now, mem);
    }

    fn writeback(&mut self, t: usize, now: u64) {
        if !self.threads[t].is_running() {
            return;
        }
        let ctx = &mut self.threads[t];
        let pipe = &mut self.pipes[t];
        let mut idx = 0;
        while idx < pipe.rob.len() {
            let Some(d) = pipe.rob.get_mut(idx) else {
                break;
            };
            idx += 1;
            match d.state {
                InstState::Executing { done_at } if done_at <= now => d.state = InstState::Complete,
                _ => continue,
            }
            if !d.inst.is_cond_branch() {
                continue;
            }
            let (seq, pc, next, taken) = (d.seq, d.pc, d.next_pc(), d.taken);
            let predicted = d.predicted;
            match predicted {
                None => {
                    if pipe.fetch.is_blocked_on(seq) {
                        let _ = pipe.fetch.redirect(next);
                    }
                }
                Some(guess) if guess != taken => {
                    ctx.stats.mispredicts += 1;
                    let squashed = pipe.squash_after(seq, next);
                    ctx.stats.squashed += squashed as u64;
                    debug!(thread = t, pc, squashed, redirect = next, "branch mispredicted");
                    break;
                }
                Some(_) => {}
            }
        }
    }

    /// Delivers the highest-priority pending interrupt of thread `t`, if it can take one.
    fn deliver_interrupt(&mut self, t: usize, now: u64, intc: &mut InterruptController) -> bool {
        let ctx = &mut self.threads[t];
        let Some(handler) = ctx.program().and_then(Program::handler_pc) else {
            return false;
        };
        if ctx.in_handler || intc.peek_highest(t).is_none() {
            return false;
        }
        let Some(irq) = intc.take_highest(t) else {
            return false;
        };
        let squashed = self.pipes[t].flush_to(handler);
        ctx.stats.squashed += squashed as u64;
        ctx.stats.interrupts += 1;
        ctx.epc = ctx.commit_pc;
        ctx.in_handler = true;
        debug!(
            thread = t,
            class = %irq.class,
            epc = ctx.epc,
            latency = now.saturating_sub(irq.posted_at),
            "interrupt delivered"
        );
        true
    }

    fn commit(&mut self, now: u64, intc: &mut InterruptController) {
        let n = self.threads.len();
        let mut budget = self.commit_width;
        for k in 0..n {
            let t = (self.commit_rr + k) % n;
            if budget == 0 {
                break;
            }
            if !self.threads[t].is_running() || self.deliver_interrupt(t, now, intc) {
                continue;
            }
            budget = self.commit_thread(t, now, budget);
        }
        self.commit_rr = (self.commit_rr + 1) % n;
    }

    fn commit_thread(&mut self, t: usize, now: u64, mut budget: usize) -> usize {
        while budget > 0 {
            let ctx = &mut self.threads[t];
            let pipe = &mut self.pipes[t];
            let Some(head) = pipe.rob.head() else {
                break;
            };
            if head.state != InstState::Complete {
                break;
            }
            if let Some(fault) = head.fault {
                self.terminate(t, ThreadState::Faulted { fault, cycle: now });
                break;
            }
            match head.inst {
                Instruction::Sd { .. } => {
                    let addr = head.addr.unwrap_or_default();
                    if !pipe.store_buffer.push(head.pc, addr, head.result) {
                        ctx.stats.store_buffer_stalls += 1;
                        break;
                    }
                    ctx.stats.stores += 1;
                }
                Instruction::Ld { .. } => ctx.stats.loads += 1,
                Instruction::Exit { .. } => {
                    let code = head.result;
                    ctx.stats.committed += 1;
                    self.terminate(t, ThreadState::Exited { code, cycle: now });
                    break;
                }
                _ => {}
            }
            let Some(d) = pipe.rob.pop_head() else {
                break;
            };
            if let Some(rd) = d.inst.dest() {
                ctx.write_reg(rd, d.result);
            }
            if d.inst.is_cond_branch() {
                ctx.stats.branches += 1;
                pipe.predictor.update(d.pc, d.taken);
            }
            ctx.commit_pc = d.next_pc();
            ctx.stats.committed += 1;
            budget -= 1;
            trace!(thread = t, pc = d.pc, inst = %d.inst, "commit");

            if d.inst == Instruction::Iret {
                let resume = if ctx.in_handler { ctx.epc } else { ctx.commit_pc };
                ctx.in_handler = false;
                ctx.commit_pc = resume;
                ctx.stats.squashed += pipe.flush_to(resume) as u64;
                break;
            }
        }
        budget
    }

    /// Ends thread `t` and discards its in-flight work. Committed stores still drain.
    fn terminate(&mut self, t: usize, state: ThreadState) {
        let ctx = &mut self.threads[t];
        ctx.stats.squashed += self.pipes[t].shut_down() as u64;
        ctx.state = state;
        self.inflight.retain(|_, owner| match *owner {
            Inflight::Fetch { thread, .. } | Inflight::Load { thread, .. } => thread != t,
            Inflight::Store { .. } => true,
        });
        debug!(thread = t, %state, "thread terminated");
    }

    fn drain_store(&mut self, t: usize, now: u64, mem: &mut dyn CoreMemory) {
        let Some(entry) = self.pipes[t].store_buffer.next_unsent() else {
            return;
        };
        let id = self.ids.next_id();
        let pkt = Packet::write(id, entry.addr, entry.data.to_le_bytes().to_vec()).with_thread(t);
        match mem.send(CorePort::Data, pkt, now) {
            Ok(()) => {
                entry.sent = Some(id);
                let _ = self.inflight.insert(id, Inflight::Store { thread: t });
            }
            Err(rejected) => {
                self.threads[t].stats.data_stalls += 1;
                trace!(thread = t, reason = %rejected.reason, "store drain refused");
            }
        }
    }

    fn issue(&mut self, now: u64, mem: &mut dyn CoreMemory) {
        let n = self.threads.len();
        let mut budget = self.issue_width;
        for k in 0..n {
            let t = (self.issue_rr + k) % n;
            if budget == 0 {
                break;
            }
            if self.threads[t].is_running() {
                budget = self.issue_thread(t, now, budget, mem);
            }
        }
        self.issue_rr = (self.issue_rr + 1) % n;
    }

    fn issue_thread(
        &mut self,
        t: usize,
        now: u64,
        mut budget: usize,
        mem: &mut dyn CoreMemory,
    ) -> usize {
        let in_order = self.kind == CoreType::InOrder;
        let mut idx = 0;
        while budget > 0 && idx < self.pipes[t].rob.len() {
            let Some(d) = self.pipes[t].rob.get(idx) else {
                break;
            };
            if d.state != InstState::Waiting {
                idx += 1;
                continue;
            }
            if d.ready_at > now {
                break;
            }
            let started = match self.execute(t, idx, now) {
                Issue::Started => true,
                Issue::Blocked => false,
                Issue::Load { addr } => self.send_load(t, idx, addr, now, mem),
            };
            if started {
                budget -= 1;
            } else if in_order {
                break;
            }
            idx += 1;
        }
        budget
    }

    /// Reads operands of ROB entry `idx` and starts it if they are ready.
    fn execute(&mut self, t: usize, idx: usize, now: u64) -> Issue {
        let ctx = &mut self.threads[t];
        let pipe = &mut self.pipes[t];
        let Some(d) = pipe.rob.get(idx) else {
            return Issue::Blocked;
        };
        let inst = d.inst;
        let mut vals = [0u64; 2];
        for (slot, src) in inst.sources().into_iter().enumerate() {
            let Some(reg) = src else {
                continue;
            };
            vals[slot] = match pipe.rob.operand(idx, reg) {
                Operand::Forwarded(v) => v,
                Operand::Architectural => ctx.read_reg(reg),
                Operand::Pending => return Issue::Blocked,
            };
        }
        let [a, b] = vals;

        let mut forwarded = None;
        if let Instruction::Ld { .. } = inst {
            let addr = inst.effective_addr(a).unwrap_or_default();
            if addr % WORD_BYTES as u64 == 0 {
                forwarded = match pipe.rob.search_stores(idx, addr) {
                    StoreSearch::Unresolved => return Issue::Blocked,
                    StoreSearch::Forward(v) => Some(v),
                    StoreSearch::Clear => pipe.store_buffer.forward(addr),
                };
                if forwarded.is_none() {
                    if let Some(d) = pipe.rob.get_mut(idx) {
                        d.addr = Some(addr);
                    }
                    return Issue::Load { addr };
                }
                ctx.stats.forwarded_loads += 1;
            }
        }

        let Some(d) = pipe.rob.get_mut(idx) else {
            return Issue::Blocked;
        };
        let mut done_at = now + inst.latency();
        match inst.class() {
            InstClass::Alu | InstClass::Mul => d.result = inst.alu(a, b),
            InstClass::Branch | InstClass::Jump => d.taken = inst.taken(a),
            InstClass::System => d.result = a,
            InstClass::Load | InstClass::Store => {
                let addr = inst.effective_addr(a).unwrap_or_default();
                d.addr = Some(addr);
                if inst.class() == InstClass::Store {
                    d.result = b;
                }
                if addr % WORD_BYTES as u64 != 0 {
                    d.fault = Some(ThreadFault::SegmentationFault {
                        pc: d.pc,
                        cause: AccessFault::Misaligned {
                            addr,
                            size: WORD_BYTES,
                        },
                    });
                } else if let Some(v) = forwarded {
                    d.result = v;
                }
                done_at = now + 1;
            }
        }
        d.state = InstState::Executing { done_at };
        Issue::Started
    }

    fn send_load(
        &mut self,
        t: usize,
        idx: usize,
        addr: u64,
        now: u64,
        mem: &mut dyn CoreMemory,
    ) -> bool {
        let Some(seq) = self.pipes[t].rob.get(idx).map(|d| d.seq) else {
            return false;
        };
        let id = self.ids.next_id();
        let pkt = Packet::read(id, addr, WORD_BYTES).with_thread(t);
        match mem.send(CorePort::Data, pkt, now) {
            Ok(()) => {
                if let Some(d) = self.pipes[t].rob.get_mut(idx) {
                    d.state = InstState::Memory;
                }
                let _ = self.inflight.insert(id, Inflight::Load { thread: t, seq });
                trace!(thread = t, id = %id, addr, "load sent");
                true
            }
            Err(_) => {
                self.threads[t].stats.data_stalls += 1;
                false
            }
        }
    }

    /// Decode and dispatch. In-order cores decode straight into the ROB.
    fn dispatch(&mut self, now: u64) {
        let in_order = self.kind == CoreType::InOrder;
        let n = self.threads.len();
        let mut budget = self.dispatch_width;
        for k in 0..n {
            let t = (self.issue_rr + k) % n;
            if !self.threads[t].is_running() {
                continue;
            }
            let pipe = &mut self.pipes[t];
            if !in_order {
                while budget > 0
                    && !pipe.rob.is_full()
                    && pipe.decoded.front().is_some_and(|d| d.ready_at <= now)
                {
                    let Some(mut d) = pipe.decoded.pop_front() else {
                        break;
                    };
                    d.ready_at = now + 1;
                    if let Err(d) = pipe.rob.allocate(d) {
                        pipe.decoded.push_front(d);
                        break;
                    }
                    budget -= 1;
                }
            }
            for _ in 0..self.fetch_width {
                let room = if in_order {
                    !pipe.rob.is_full()
                } else {
                    pipe.can_decode()
                };
                if !room {
                    break;
                }
                let Some(mut d) = pipe.fetch.pop_ready(now) else {
                    break;
                };
                d.ready_at = now + 1;
                if in_order {
                    if let Err(d) = pipe.rob.allocate(d) {
                        pipe.fetch.requeue(d);
                        break;
                    }
                } else {
                    pipe.decoded.push_back(d);
                }
            }
        }
    }

    fn fetch(&mut self, now: u64, mem: &mut dyn CoreMemory) {
        let n = self.threads.len();
        for k in 0..n {
            let t = (self.fetch_rr + k) % n;
            if !self.threads[t].is_running() || !self.pipes[t].fetch.can_fetch() {
                continue;
            }
            let ctx = &mut self.threads[t];
            let pipe = &mut self.pipes[t];
            let Some(program) = ctx.program() else {
                continue;
            };
            let pc = pipe.fetch.pc;
            if program.index_of(pc).is_none() {
                let seq = pipe.alloc_seq();
                pipe.fetch
                    .push_fault(seq, ThreadFault::FetchOutOfBounds { pc }, now);
                self.fetch_rr = (t + 1) % n;
                return;
            }
            let count = pipe.fetch.group_len(program, self.line_bytes);
            let id = self.ids.next_id();
            let pkt = Packet::read(id, pc, count * INST_BYTES as usize).with_thread(t);
            match mem.send(CorePort::Inst, pkt, now) {
                Ok(()) => {
                    pipe.fetch.set_pending(id);
                    ctx.stats.fetch_requests += 1;
                    let _ = self.inflight.insert(id, Inflight::Fetch { thread: t, count });
                    self.fetch_rr = (t + 1) % n;
                }
                Err(_) => ctx.stats.fetch_stalls += 1,
            }
            return;
        }
    }

    /// Accepts a response from the instruction or data cache.
    pub fn receive(&mut self, pkt: Packet, now: u64) {
        let Some(owner) = self.inflight.remove(&pkt.id) else {
            trace!(id = %pkt.id, "response for cancelled request dropped");
            return;
        };
        match owner {
            Inflight::Fetch { thread, count } => self.receive_fetch(thread, count, &pkt, now),
            Inflight::Load { thread, seq } => {
                let Some(d) = self.pipes[thread].rob.find_mut(seq) else {
                    return;
                };
                if d.state != InstState::Memory {
                    return;
                }
                match pkt.fault() {
                    Some(cause) => d.fault = Some(ThreadFault::SegmentationFault { pc: d.pc, cause }),
                    None => d.result = pkt.word(),
                }
                d.state = InstState::Complete;
            }
            Inflight::Store { thread } => {
                let Some(entry) = self.pipes[thread].store_buffer.acknowledge(pkt.id) else {
                    return;
                };
                let Some(cause) = pkt.fault() else {
                    return;
                };
                if self.threads[thread].is_running() {
                    let fault = ThreadFault::SegmentationFault { pc: entry.pc, cause };
                    self.terminate(thread, ThreadState::Faulted { fault, cycle: now });
                } else {
                    warn!(thread, %cause, "store fault after thread termination");
                }
            }
        }
    }

    fn receive_fetch(&mut self, t: usize, count: usize, pkt: &Packet, now: u64) {
        let ctx = &mut self.threads[t];
        let pipe = &mut self.pipes[t];
        if !ctx.is_running() {
            return;
        }
        if let Some(cause) = pkt.fault() {
            let seq = pipe.next_seq;
            let fault = ThreadFault::SegmentationFault { pc: pkt.addr, cause };
            if pipe.fetch.fail(pkt.id, seq, fault, now) {
                pipe.next_seq += 1;
            }
            return;
        }
        let Some(program) = ctx.program() else {
            return;
        };
        if let Some(n) = pipe.fetch.accept(
            pkt.id,
            count,
            program,
            &pipe.predictor,
            &mut pipe.next_seq,
            now,
        ) {
            ctx.stats.fetched += n as u64;
        }
    }
}
