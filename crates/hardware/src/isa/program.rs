//! Programs and workloads.
//!
//! A [`Workload`] is what the configuration names: an opaque path plus arguments.
//! A [`WorkloadLoader`] turns it into a [`Program`], the instruction stream one
//! hardware thread executes.

use serde::Deserialize;

use super::instruction::{INST_BYTES, Instruction, NUM_REGS, Reg};
use crate::common::AddrRange;
use crate::common::error::LoadError;

/// Default fetch address of instruction index 0.
pub const DEFAULT_TEXT_BASE: u64 = 0x1000;

/// An executable assigned to one thread context.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WorkloadSpec {
    /// Bare path, no arguments.
    Path(String),
    /// Path with an argument list.
    Full {
        /// Executable path.
        path: String,
        /// Arguments passed to the program.
        #[serde(default)]
        args: Vec<String>,
    },
}

/// An executable path and its argument list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "WorkloadSpec")]
pub struct Workload {
    /// Executable path, opaque to the harness.
    pub path: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl Workload {
    /// Creates a workload with no arguments.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl From<WorkloadSpec> for Workload {
    fn from(spec: WorkloadSpec) -> Self {
        match spec {
            WorkloadSpec::Path(path) => Self::new(path),
            WorkloadSpec::Full { path, args } => Self { path, args },
        }
    }
}

/// Produces programs from workloads.
///
/// The harness never reads files itself; the caller supplies a loader.
pub trait WorkloadLoader {
    /// Loads the program for `workload`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when the workload cannot be read or parsed.
    fn load(&self, workload: &Workload) -> Result<Program, LoadError>;
}

/// The instruction stream of one hardware thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    /// Instructions, addressed by index.
    pub instructions: Vec<Instruction>,
    /// Index of the first instruction executed.
    pub entry: usize,
    /// Index of the interrupt handler, if the program installs one.
    pub handler: Option<usize>,
    /// Fetch address of index 0.
    pub text_base: u64,
    /// Register values set before the first cycle.
    pub init_regs: Vec<(Reg, u64)>,
}

impl Program {
    /// Creates a program starting at index 0 with the default text base.
    pub const fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            entry: 0,
            handler: None,
            text_base: DEFAULT_TEXT_BASE,
            init_regs: Vec::new(),
        }
    }

    /// Installs an interrupt handler at `index`.
    #[must_use]
    pub fn with_handler(mut self, index: usize) -> Self {
        self.handler = Some(index);
        self
    }

    /// Moves the program text to `base`.
    #[must_use]
    pub fn with_text_base(mut self, base: u64) -> Self {
        self.text_base = base;
        self
    }

    /// Presets a register. Writes to `r0` or out-of-range registers are ignored.
    #[must_use]
    pub fn with_reg(mut self, reg: Reg, value: u64) -> Self {
        if reg != 0 && (reg as usize) < NUM_REGS {
            self.init_regs.push((reg, value));
        }
        self
    }

    /// Fetch address of instruction `index`.
    #[inline]
    pub const fn pc_of(&self, index: usize) -> u64 {
        self.text_base + index as u64 * INST_BYTES
    }

    /// Instruction index for fetch address `pc`, if it lies inside the text.
    pub fn index_of(&self, pc: u64) -> Option<usize> {
        let off = pc.checked_sub(self.text_base)?;
        if off % INST_BYTES != 0 {
            return None;
        }
        let idx = usize::try_from(off / INST_BYTES).ok()?;
        (idx < self.instructions.len()).then_some(idx)
    }

    /// Instruction at fetch address `pc`.
    pub fn fetch(&self, pc: u64) -> Option<Instruction> {
        self.index_of(pc).map(|i| self.instructions[i])
    }

    /// Address window covered by the program text.
    pub fn text_range(&self) -> AddrRange {
        AddrRange::new(self.text_base, self.instructions.len() as u64 * INST_BYTES)
    }

    /// Entry fetch address.
    pub const fn entry_pc(&self) -> u64 {
        self.pc_of(self.entry)
    }

    /// Handler fetch address, if installed.
    pub fn handler_pc(&self) -> Option<u64> {
        self.handler.map(|h| self.pc_of(h))
    }

    /// Checks that every branch target, the entry and the handler lie inside the text.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Empty`] or [`LoadError::Syntax`] naming the offending index.
    pub fn check(&self, path: &str) -> Result<(), LoadError> {
        let len = self.instructions.len();
        if len == 0 {
            return Err(LoadError::Empty { path: path.into() });
        }
        let bad = |line: usize, reason: String| LoadError::Syntax {
            path: path.into(),
            line,
            reason,
        };
        if self.entry >= len {
            return Err(bad(0, format!("entry index {} outside program", self.entry)));
        }
        if let Some(h) = self.handler.filter(|&h| h >= len) {
            return Err(bad(0, format!("handler index {h} outside program")));
        }
        for (i, inst) in self.instructions.iter().enumerate() {
            if let Some(t) = inst.target().filter(|&t| t >= len) {
                return Err(bad(i + 1, format!("branch target {t} outside program")));
            }
        }
        Ok(())
    }
}
