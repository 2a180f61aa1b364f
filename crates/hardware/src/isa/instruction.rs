//! Micro-instruction definitions.
//!
//! Workloads are expressed in a small register-machine instruction set that is
//! rich enough to exercise every pipeline path: ALU and multi-cycle arithmetic,
//! loads and stores through the data cache, conditional branches for the
//! predictor, interrupt return and thread exit.
//!
//! Branch and jump targets are instruction indices inside the owning
//! [`Program`](super::Program); the fetch address of index `i` is
//! `text_base + 4 * i`.

use std::fmt;

/// Number of architectural integer registers.
pub const NUM_REGS: usize = 32;

/// Size of every memory access made by `ld`/`sd`, in bytes.
pub const WORD_BYTES: usize = 8;

/// Size of one encoded instruction in the fetch stream, in bytes.
pub const INST_BYTES: u64 = 4;

/// Register index (`r0`..`r31`). `r0` always reads zero.
pub type Reg = u8;

/// Execution resource class, which decides latency and issue rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstClass {
    /// Single-cycle integer operation.
    Alu,
    /// Multi-cycle multiply.
    Mul,
    /// Data-cache read.
    Load,
    /// Data-cache write, performed after commit.
    Store,
    /// Conditional branch.
    Branch,
    /// Unconditional jump.
    Jump,
    /// `iret`/`exit`: serialising, resolved at commit.
    System,
}

/// A decoded micro-instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// No operation.
    Nop,
    /// `rd = imm`.
    Li {
        /// Destination.
        rd: Reg,
        /// Immediate.
        imm: i64,
    },
    /// `rd = rs1 + rs2`.
    Add {
        /// Destination.
        rd: Reg,
        /// First source.
        rs1: Reg,
        /// Second source.
        rs2: Reg,
    },
    /// `rd = rs1 - rs2`.
    Sub {
        /// Destination.
        rd: Reg,
        /// First source.
        rs1: Reg,
        /// Second source.
        rs2: Reg,
    },
    /// `rd = rs1 + imm`.
    Addi {
        /// Destination.
        rd: Reg,
        /// Source.
        rs1: Reg,
        /// Immediate.
        imm: i64,
    },
    /// `rd = rs1 * rs2` (wrapping).
    Mul {
        /// Destination.
        rd: Reg,
        /// First source.
        rs1: Reg,
        /// Second source.
        rs2: Reg,
    },
    /// `rd = mem[base + offset]` (8 bytes).
    Ld {
        /// Destination.
        rd: Reg,
        /// Address base register.
        base: Reg,
        /// Address offset.
        offset: i64,
    },
    /// `mem[base + offset] = src` (8 bytes).
    Sd {
        /// Value register.
        src: Reg,
        /// Address base register.
        base: Reg,
        /// Address offset.
        offset: i64,
    },
    /// Branch to `target` if `rs == 0`.
    Beqz {
        /// Tested register.
        rs: Reg,
        /// Target instruction index.
        target: usize,
    },
    /// Branch to `target` if `rs != 0`.
    Bnez {
        /// Tested register.
        rs: Reg,
        /// Target instruction index.
        target: usize,
    },
    /// Unconditional jump to `target`.
    J {
        /// Target instruction index.
        target: usize,
    },
    /// Return from the interrupt handler.
    Iret,
    /// Terminate the thread with exit code `rs`.
    Exit {
        /// Register holding the exit code.
        rs: Reg,
    },
}

impl Instruction {
    /// Returns the execution class.
    pub const fn class(&self) -> InstClass {
        match self {
            Self::Nop | Self::Li { .. } | Self::Add { .. } | Self::Sub { .. } | Self::Addi { .. } => {
                InstClass::Alu
            }
            Self::Mul { .. } => InstClass::Mul,
            Self::Ld { .. } => InstClass::Load,
            Self::Sd { .. } => InstClass::Store,
            Self::Beqz { .. } | Self::Bnez { .. } => InstClass::Branch,
            Self::J { .. } => InstClass::Jump,
            Self::Iret | Self::Exit { .. } => InstClass::System,
        }
    }

    /// Returns the destination register, ignoring writes to `r0`.
    pub const fn dest(&self) -> Option<Reg> {
        let rd = match *self {
            Self::Li { rd, .. }
            | Self::Add { rd, .. }
            | Self::Sub { rd, .. }
            | Self::Addi { rd, .. }
            | Self::Mul { rd, .. }
            | Self::Ld { rd, .. } => rd,
            _ => return None,
        };
        if rd == 0 { None } else { Some(rd) }
    }

    /// Returns the source registers (up to two).
    pub const fn sources(&self) -> [Option<Reg>; 2] {
        match *self {
            Self::Add { rs1, rs2, .. } | Self::Sub { rs1, rs2, .. } | Self::Mul { rs1, rs2, .. } => {
                [Some(rs1), Some(rs2)]
            }
            Self::Addi { rs1, .. } => [Some(rs1), None],
            Self::Ld { base, .. } => [Some(base), None],
            Self::Sd { src, base, .. } => [Some(base), Some(src)],
            Self::Beqz { rs, .. } | Self::Bnez { rs, .. } | Self::Exit { rs } => [Some(rs), None],
            _ => [None, None],
        }
    }

    /// Returns true for conditional branches.
    pub const fn is_cond_branch(&self) -> bool {
        matches!(self, Self::Beqz { .. } | Self::Bnez { .. })
    }

    /// Execution latency in cycles for non-memory classes.
    pub const fn latency(&self) -> u64 {
        match self.class() {
            InstClass::Mul => 3,
            _ => 1,
        }
    }

    /// Returns the branch/jump target index, if any.
    pub const fn target(&self) -> Option<usize> {
        match *self {
            Self::Beqz { target, .. } | Self::Bnez { target, .. } | Self::J { target } => {
                Some(target)
            }
            _ => None,
        }
    }

    /// Evaluates an ALU or multiply instruction on its source operands.
    pub const fn alu(&self, a: u64, b: u64) -> u64 {
        match *self {
            Self::Li { imm, .. } => imm as u64,
            Self::Add { .. } => a.wrapping_add(b),
            Self::Sub { .. } => a.wrapping_sub(b),
            Self::Addi { imm, .. } => a.wrapping_add(imm as u64),
            Self::Mul { .. } => a.wrapping_mul(b),
            _ => 0,
        }
    }

    /// Effective address of a load or store, given the base register value.
    pub const fn effective_addr(&self, base: u64) -> Option<u64> {
        match *self {
            Self::Ld { offset, .. } | Self::Sd { offset, .. } => {
                Some(base.wrapping_add(offset as u64))
            }
            _ => None,
        }
    }

    /// Resolves a conditional branch on its tested value.
    pub const fn taken(&self, value: u64) -> bool {
        match self {
            Self::Beqz { .. } => value == 0,
            Self::Bnez { .. } => value != 0,
            Self::J { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Nop => write!(f, "nop"),
            Self::Li { rd, imm } => write!(f, "li r{rd}, {imm}"),
            Self::Add { rd, rs1, rs2 } => write!(f, "add r{rd}, r{rs1}, r{rs2}"),
            Self::Sub { rd, rs1, rs2 } => write!(f, "sub r{rd}, r{rs1}, r{rs2}"),
            Self::Addi { rd, rs1, imm } => write!(f, "addi r{rd}, r{rs1}, {imm}"),
            Self::Mul { rd, rs1, rs2 } => write!(f, "mul r{rd}, r{rs1}, r{rs2}"),
            Self::Ld { rd, base, offset } => write!(f, "ld r{rd}, {offset}(r{base})"),
            Self::Sd { src, base, offset } => write!(f, "sd r{src}, {offset}(r{base})"),
            Self::Beqz { rs, target } => write!(f, "beqz r{rs}, @{target}"),
            Self::Bnez { rs, target } => write!(f, "bnez r{rs}, @{target}"),
            Self::J { target } => write!(f, "j @{target}"),
            Self::Iret => write!(f, "iret"),
            Self::Exit { rs } => write!(f, "exit r{rs}"),
        }
    }
}
