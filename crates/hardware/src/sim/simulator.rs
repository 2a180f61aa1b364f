//! Simulator: owns the clock and the assembled system.
//!
//! The simulator performs:
//! 1. **Setup:** Validates the configuration, checks the workload count, builds the
//!    system and loads one program per thread context.
//! 2. **Run Loop:** Advances the clock one cycle at a time until every thread has
//!    exited or faulted and its committed stores have drained, or the tick budget runs
//!    out.
//! 3. **Report:** Final tick, final cycle, cause and per-thread outcome.

use std::fmt;

use tracing::{debug, info};

use crate::common::ConfigError;
use crate::config::Config;
use crate::core::thread::ThreadState;
use crate::isa::WorkloadLoader;
use crate::sim::clock::Clock;
use crate::soc::System;
use crate::soc::devices::InterruptClass;
use crate::stats::SimStats;

/// Process exit code for a thread fault (128 + SIGSEGV).
pub const EXIT_SEGFAULT: i32 = 139;

/// Process exit code when the tick budget runs out.
pub const EXIT_TIMEOUT: i32 = 124;

/// Why the run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitCause {
    /// Every workload executed `exit`.
    WorkloadExited,
    /// `maxTicks` elapsed first.
    TickBudgetExhausted,
    /// A thread was terminated by an illegal access.
    SegmentationFault {
        /// The first thread to fault.
        thread: usize,
    },
}

impl fmt::Display for ExitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkloadExited => write!(f, "workload exited normally"),
            Self::TickBudgetExhausted => write!(f, "tick budget exhausted"),
            Self::SegmentationFault { thread } => write!(f, "segmentation fault in thread {thread}"),
        }
    }
}

/// Final state of one thread context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadOutcome {
    /// Thread index.
    pub thread: usize,
    /// Workload path, if one was assigned.
    pub workload: Option<String>,
    /// Run state at the end of the run.
    pub state: ThreadState,
    /// Instructions committed.
    pub committed: u64,
}

/// Result of [`Simulator::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Simulated time at the end of the run, in ticks.
    pub final_tick: u64,
    /// Cycles simulated.
    pub cycles: u64,
    /// Why the run ended.
    pub cause: ExitCause,
    /// Per-thread outcome.
    pub threads: Vec<ThreadOutcome>,
}

impl RunReport {
    /// Process exit code: 124 on timeout, 139 if a thread faulted, otherwise the first
    /// non-zero workload exit code (0 when every workload exited with 0).
    pub fn exit_code(&self) -> i32 {
        match self.cause {
            ExitCause::TickBudgetExhausted => EXIT_TIMEOUT,
            ExitCause::SegmentationFault { .. } => EXIT_SEGFAULT,
            ExitCause::WorkloadExited => self
                .threads
                .iter()
                .find_map(|t| match t.state {
                    ThreadState::Exited { code, .. } if code != 0 => {
                        Some(i32::try_from(code & 0xff).unwrap_or(1).max(1))
                    }
                    _ => None,
                })
                .unwrap_or(0),
        }
    }
}

/// Top-level simulator: global clock plus the component graph.
#[derive(Debug)]
pub struct Simulator {
    config: Config,
    system: System,
    clock: Clock,
}

impl Simulator {
    /// Builds the system and loads one workload per thread context.
    ///
    /// With one thread context exactly one workload is required. With more, between one
    /// and `threadCount` workloads are accepted; surplus contexts stay idle.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::InvalidConfiguration`] for bad parameters or wiring.
    /// * [`ConfigError::WorkloadCountMismatch`] for a wrong number of workloads.
    /// * [`ConfigError::Workload`] if the loader fails.
    pub fn new(config: Config, loader: &dyn WorkloadLoader) -> Result<Self, ConfigError> {
        config.validate()?;
        let threads = config.core.thread_count;
        let workloads = config.workload_paths.len();
        let fits = if threads == 1 {
            workloads == 1
        } else {
            (1..=threads).contains(&workloads)
        };
        if !fits {
            return Err(ConfigError::WorkloadCountMismatch { threads, workloads });
        }

        let mut system = System::from_config(&config)?;
        for (t, workload) in config.workload_paths.iter().enumerate() {
            let program = loader.load(workload)?;
            program.check(&workload.path)?;
            debug!(
                thread = t,
                workload = %workload.path,
                instructions = program.instructions.len(),
                "workload loaded"
            );
            system.core.start_thread(t, workload.clone(), program)?;
        }
        let clock = Clock::new(config.clock_period());
        Ok(Self {
            config,
            system,
            clock,
        })
    }

    /// The configuration the system was built from.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The assembled system.
    pub const fn system(&self) -> &System {
        &self.system
    }

    /// Mutable access to the system, e.g. to preload memory.
    pub const fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    /// Current cycle.
    pub const fn cycle(&self) -> u64 {
        self.clock.cycle()
    }

    /// Current simulated time in ticks.
    pub const fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// Posts an interrupt of `class` for `thread` at cycle `at`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if `thread` does not exist.
    pub fn schedule_interrupt(
        &mut self,
        at: u64,
        thread: usize,
        class: InterruptClass,
    ) -> Result<(), ConfigError> {
        if thread >= self.system.interrupts.threads() {
            return Err(ConfigError::invalid(format!(
                "interrupt for thread {thread} but only {} thread context(s)",
                self.system.interrupts.threads()
            )));
        }
        self.system
            .interrupts
            .schedule(at.max(self.clock.cycle()), thread, class);
        Ok(())
    }

    /// Returns true once every thread is finished and its stores have drained.
    pub fn is_finished(&self) -> bool {
        self.system.core.is_finished()
    }

    /// Simulates one cycle.
    pub fn step(&mut self) {
        self.system.tick(self.clock.cycle());
        self.clock.advance();
    }

    /// True when another whole cycle would run past `maxTicks`.
    fn budget_exhausted(&self) -> bool {
        self.config
            .max_ticks
            .is_some_and(|max| self.clock.tick() + self.clock.period() > max)
    }

    /// Runs until every thread is finished or the tick budget is exhausted.
    pub fn run(&mut self) -> RunReport {
        info!(
            threads = self.config.core.thread_count,
            core = ?self.config.core.core_type,
            predictor = ?self.config.core.branch_predictor,
            clock = %self.config.clock,
            "simulation started"
        );
        let mut timed_out = false;
        while !self.is_finished() {
            if self.budget_exhausted() {
                timed_out = true;
                break;
            }
            self.step();
        }
        let report = self.report(timed_out);
        info!(
            tick = report.final_tick,
            cycles = report.cycles,
            cause = %report.cause,
            "simulation finished"
        );
        report
    }

    fn report(&self, timed_out: bool) -> RunReport {
        let threads: Vec<ThreadOutcome> = self
            .system
            .core
            .threads()
            .iter()
            .map(|ctx| ThreadOutcome {
                thread: ctx.id(),
                workload: ctx.workload().map(|w| w.path.clone()),
                state: ctx.state,
                committed: ctx.stats.committed,
            })
            .collect();
        let first_fault = threads
            .iter()
            .filter_map(|t| match t.state {
                ThreadState::Faulted { cycle, .. } => Some((cycle, t.thread)),
                _ => None,
            })
            .min();
        let cause = if timed_out {
            ExitCause::TickBudgetExhausted
        } else if let Some((_, thread)) = first_fault {
            ExitCause::SegmentationFault { thread }
        } else {
            ExitCause::WorkloadExited
        };
        RunReport {
            final_tick: self.clock.tick(),
            cycles: self.clock.cycle(),
            cause,
            threads,
        }
    }

    /// Snapshot of every counter in the system.
    pub fn stats(&self) -> SimStats {
        SimStats::collect(&self.system, &self.clock)
    }
}
