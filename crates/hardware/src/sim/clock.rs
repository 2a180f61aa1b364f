//! Global clock and timed event queue.
//!
//! The driver owns one [`Clock`]; every component receives the current cycle as an
//! argument and never keeps its own notion of time. Work that completes later is
//! parked in a [`DelayQueue`] keyed by the cycle at which it becomes visible.
//!
//! Items due in the same cycle come out in insertion order, so two identical runs
//! produce identical traces.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Cycle counter plus the tick period used for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    cycle: u64,
    period: u64,
}

impl Clock {
    /// Creates a clock at cycle 0.
    ///
    /// # Arguments
    ///
    /// * `period` - Ticks per cycle (picoseconds for the default tick resolution).
    pub const fn new(period: u64) -> Self {
        Self { cycle: 0, period }
    }

    /// Current cycle.
    #[inline]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Current simulated time in ticks.
    #[inline]
    pub const fn tick(&self) -> u64 {
        self.cycle * self.period
    }

    /// Ticks per cycle.
    pub const fn period(&self) -> u64 {
        self.period
    }

    /// Advances by one cycle.
    #[inline]
    pub const fn advance(&mut self) {
        self.cycle += 1;
    }
}

struct Timed<T> {
    due: u64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Timed<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.due, self.seq) == (other.due, other.seq)
    }
}

impl<T> Eq for Timed<T> {}

impl<T> Ord for Timed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on (due, seq)
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl<T> PartialOrd for Timed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Items that become visible at a future cycle.
pub struct DelayQueue<T> {
    heap: BinaryHeap<Timed<T>>,
    seq: u64,
}

impl<T> std::fmt::Debug for DelayQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayQueue")
            .field("len", &self.heap.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DelayQueue<T> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Schedules `item` to become visible at `now + delay`.
    ///
    /// # Arguments
    ///
    /// * `now` - Current cycle.
    /// * `delay` - Cycles until the item is due; zero makes it due immediately.
    /// * `item` - Payload.
    pub fn schedule(&mut self, now: u64, delay: u64, item: T) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Timed {
            due: now.saturating_add(delay),
            seq,
            item,
        });
    }

    /// Removes and returns the earliest item due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<T> {
        if self.heap.peek()?.due <= now {
            self.heap.pop().map(|t| t.item)
        } else {
            None
        }
    }

    /// Removes and returns every item due at or before `now`, in due order.
    pub fn drain_due(&mut self, now: u64) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = self.pop_due(now) {
            out.push(item);
        }
        out
    }

    /// Cycle at which the next item becomes due.
    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|t| t.due)
    }

    /// Keeps only the items for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.heap.retain(|t| keep(&t.item));
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
