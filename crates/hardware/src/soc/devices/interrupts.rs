//! Interrupt Controller.
//!
//! Queues interrupt requests per hardware thread and hands them to the core one at
//! a time. It provides:
//! 1. **Priority:** Fixed class order `External > Timer > Software`; FIFO within a class.
//! 2. **No Loss:** A posted interrupt stays queued until delivered or explicitly cleared.
//! 3. **PIO Window:** Eight bytes per thread at `base + 8 * thread`, reachable over the bus.
//! 4. **Scheduled Posts:** The driver can arrange for an interrupt to be posted at a cycle.
//!
//! # PIO Register
//!
//! * Store `class` (0 software, 1 timer, 2 external): post an interrupt to the thread.
//! * Store `CLEAR_FLAG | class`: drop every pending interrupt of that class.
//! * Load: bitmask of pending classes (bit `class`).

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace};

use crate::common::{AccessFault, AddrRange, Packet, Rejected};
use crate::isa::WORD_BYTES;
use crate::sim::clock::DelayQueue;
use crate::soc::traits::Responder;

/// Bit in a PIO store that turns a post into a clear.
pub const CLEAR_FLAG: u64 = 1 << 8;

/// Interrupt class. Higher classes are delivered first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterruptClass {
    /// Software (inter-thread) interrupt.
    Software = 0,
    /// Timer interrupt.
    Timer = 1,
    /// External device interrupt.
    External = 2,
}

impl InterruptClass {
    /// All classes, highest priority first.
    pub const BY_PRIORITY: [Self; 3] = [Self::External, Self::Timer, Self::Software];

    /// Decodes a PIO class code.
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Software),
            1 => Some(Self::Timer),
            2 => Some(Self::External),
            _ => None,
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for InterruptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Software => "software",
            Self::Timer => "timer",
            Self::External => "external",
        };
        f.write_str(s)
    }
}

/// One queued interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interrupt {
    /// Monotonic identifier.
    pub id: u64,
    /// Class.
    pub class: InterruptClass,
    /// Cycle at which it was posted.
    pub posted_at: u64,
}

/// Interrupt counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterruptStats {
    /// Interrupts posted.
    pub posted: u64,
    /// Interrupts delivered to a thread.
    pub delivered: u64,
    /// Interrupts dropped by an explicit clear.
    pub cleared: u64,
    /// PIO accesses served.
    pub pio_accesses: u64,
}

/// Per-thread interrupt queues with a bus-visible PIO window.
#[derive(Debug)]
pub struct InterruptController {
    range: AddrRange,
    latency: u64,
    queues: Vec<[VecDeque<Interrupt>; 3]>,
    next_id: u64,
    scheduled: DelayQueue<(usize, InterruptClass)>,
    responses: DelayQueue<Packet>,
    /// Statistics.
    pub stats: InterruptStats,
}

impl InterruptController {
    /// Creates a controller.
    ///
    /// # Arguments
    ///
    /// * `base` - PIO window base address.
    /// * `threads` - Number of hardware thread contexts served.
    /// * `latency` - PIO access latency in cycles.
    pub fn new(base: u64, threads: usize, latency: u64) -> Self {
        Self {
            range: AddrRange::new(base, (threads * WORD_BYTES) as u64),
            latency,
            queues: (0..threads).map(|_| Default::default()).collect(),
            next_id: 0,
            scheduled: DelayQueue::new(),
            responses: DelayQueue::new(),
            stats: InterruptStats::default(),
        }
    }

    /// PIO window.
    pub const fn range(&self) -> AddrRange {
        self.range
    }

    /// Number of thread contexts served.
    pub fn threads(&self) -> usize {
        self.queues.len()
    }

    /// Posts an interrupt.
    ///
    /// # Returns
    ///
    /// The interrupt's identifier, or `None` if `thread` does not exist.
    pub fn post(&mut self, thread: usize, class: InterruptClass, now: u64) -> Option<u64> {
        let queue = self.queues.get_mut(thread)?;
        let id = self.next_id;
        self.next_id += 1;
        queue[class.slot()].push_back(Interrupt {
            id,
            class,
            posted_at: now,
        });
        self.stats.posted += 1;
        debug!(thread, %class, id, cycle = now, "interrupt posted");
        Some(id)
    }

    /// Arranges for an interrupt to be posted at cycle `at`.
    pub fn schedule(&mut self, at: u64, thread: usize, class: InterruptClass) {
        self.scheduled.schedule(at, 0, (thread, class));
    }

    /// Returns the interrupt that would be delivered next, without removing it.
    pub fn peek_highest(&self, thread: usize) -> Option<&Interrupt> {
        let queues = self.queues.get(thread)?;
        InterruptClass::BY_PRIORITY
            .iter()
            .find_map(|c| queues[c.slot()].front())
    }

    /// Removes and returns the highest-priority pending interrupt of `thread`.
    pub fn take_highest(&mut self, thread: usize) -> Option<Interrupt> {
        let queues = self.queues.get_mut(thread)?;
        let irq = InterruptClass::BY_PRIORITY
            .iter()
            .find_map(|c| queues[c.slot()].pop_front())?;
        self.stats.delivered += 1;
        Some(irq)
    }

    /// Returns true if `thread` has any pending interrupt.
    pub fn has_pending(&self, thread: usize) -> bool {
        self.peek_highest(thread).is_some()
    }

    /// Drops every pending interrupt of `class` for `thread`.
    ///
    /// # Returns
    ///
    /// The number of interrupts removed.
    pub fn clear(&mut self, thread: usize, class: InterruptClass) -> usize {
        let Some(queues) = self.queues.get_mut(thread) else {
            return 0;
        };
        let n = queues[class.slot()].len();
        queues[class.slot()].clear();
        self.stats.cleared += n as u64;
        n
    }

    /// Pending interrupt count for `thread`.
    pub fn pending(&self, thread: usize) -> usize {
        self.queues
            .get(thread)
            .map_or(0, |q| q.iter().map(VecDeque::len).sum())
    }

    /// Bitmask of pending classes for `thread`.
    pub fn pending_mask(&self, thread: usize) -> u64 {
        self.queues.get(thread).map_or(0, |q| {
            InterruptClass::BY_PRIORITY
                .iter()
                .filter(|c| !q[c.slot()].is_empty())
                .fold(0, |m, c| m | (1 << c.slot()))
        })
    }

    /// Posts every scheduled interrupt that is due at `now`.
    fn post_scheduled(&mut self, now: u64) {
        while let Some((thread, class)) = self.scheduled.pop_due(now) {
            if self.post(thread, class, now).is_none() {
                debug!(thread, %class, "scheduled interrupt for unknown thread dropped");
            }
        }
    }

    fn pio(&mut self, pkt: &mut Packet, now: u64) {
        let offset = pkt.addr - self.range.start;
        if pkt.size != WORD_BYTES || offset % WORD_BYTES as u64 != 0 {
            pkt.fail(AccessFault::Misaligned {
                addr: pkt.addr,
                size: pkt.size,
            });
            return;
        }
        let thread = (offset / WORD_BYTES as u64) as usize;
        if pkt.is_write() {
            let value = pkt.word();
            match InterruptClass::from_code(value & !CLEAR_FLAG) {
                Some(class) if value & CLEAR_FLAG != 0 => {
                    let _ = self.clear(thread, class);
                }
                Some(class) => {
                    let _ = self.post(thread, class, now);
                }
                None => trace!(thread, value, "ignoring unknown interrupt code"),
            }
            pkt.respond(&[]);
        } else {
            let mask = self.pending_mask(thread);
            pkt.respond(&mask.to_le_bytes());
        }
    }
}

impl Responder for InterruptController {
    fn name(&self) -> &str {
        "intc"
    }

    fn try_request(&mut self, mut pkt: Packet, now: u64) -> Result<(), Rejected> {
        self.stats.pio_accesses += 1;
        if self.range.contains_access(pkt.addr, pkt.size as u64) {
            self.pio(&mut pkt, now);
        } else {
            pkt.fail(AccessFault::Unmapped { addr: pkt.addr });
        }
        self.responses.schedule(now, self.latency, pkt);
        Ok(())
    }

    fn tick(&mut self, now: u64) -> Vec<Packet> {
        self.post_scheduled(now);
        self.responses.drain_due(now)
    }

    fn busy(&self) -> bool {
        !self.responses.is_empty()
    }
}
