//! Small workloads used by the scenario tests.
//!
//! Data addresses stay well below the default 512 MiB memory size and clear of the
//! default text base.

use pipesim_core::isa::{Instruction, Program};

use Instruction::*;

/// Base of the data region used by single-threaded tests.
pub const DATA_BASE: u64 = 0x10_0000;

/// `exit(code)`.
pub fn exit_with(code: i64) -> Program {
    Program::new(vec![Li { rd: 1, imm: code }, Exit { rs: 1 }])
}

/// One load from `addr`, then `exit(0)`.
pub fn single_load(addr: u64) -> Program {
    Program::new(vec![
        Li {
            rd: 1,
            imm: addr as i64,
        },
        Ld {
            rd: 2,
            base: 1,
            offset: 0,
        },
        Exit { rs: 0 },
    ])
}

/// Counts `r1` down from `n` to zero, then exits with `r20`.
///
/// The loop branch is at index 2 and is taken `n - 1` times.
pub fn countdown(n: i64) -> Program {
    Program::new(vec![
        Li { rd: 1, imm: n },
        Addi {
            rd: 1,
            rs1: 1,
            imm: -1,
        },
        Bnez { rs: 1, target: 1 },
        Exit { rs: 20 },
    ])
}

/// [`countdown`] plus an interrupt handler that adds `bump` to `r20`.
pub fn countdown_with_handler(n: i64, bump: i64) -> Program {
    let mut insts = countdown(n).instructions;
    let handler = insts.len();
    insts.push(Addi {
        rd: 20,
        rs1: 20,
        imm: bump,
    });
    insts.push(Iret);
    Program::new(insts).with_handler(handler)
}

/// Stores `value` to `addr`, loads it back and exits with the loaded value.
pub fn store_then_load(addr: u64, value: i64) -> Program {
    Program::new(vec![
        Li {
            rd: 1,
            imm: addr as i64,
        },
        Li { rd: 2, imm: value },
        Sd {
            src: 2,
            base: 1,
            offset: 0,
        },
        Ld {
            rd: 3,
            base: 1,
            offset: 0,
        },
        Exit { rs: 3 },
    ])
}

/// Sums `n` words starting at the address held in `r10`, `stride` bytes apart.
///
/// Exits with 0; the sum is left in `r3`.
pub fn strided_sum(n: i64, stride: i64) -> Program {
    Program::new(vec![
        Li { rd: 1, imm: n },
        Li { rd: 3, imm: 0 },
        // loop:
        Ld {
            rd: 2,
            base: 10,
            offset: 0,
        },
        Add {
            rd: 3,
            rs1: 3,
            rs2: 2,
        },
        Addi {
            rd: 10,
            rs1: 10,
            imm: stride,
        },
        Addi {
            rd: 1,
            rs1: 1,
            imm: -1,
        },
        Bnez { rs: 1, target: 2 },
        Exit { rs: 0 },
    ])
}

/// `count` loads from distinct lines of `base`, each followed by a dependent use.
///
/// An in-order pipeline serialises the misses behind the uses; an out-of-order one
/// overlaps them.
pub fn dependent_loads(base: u64, count: usize, line: u64) -> Program {
    let mut insts = vec![Li {
        rd: 1,
        imm: base as i64,
    }];
    for i in 0..count {
        let rd = 2 + (i % 8) as u8 * 2;
        insts.push(Ld {
            rd,
            base: 1,
            offset: (i as u64 * line) as i64,
        });
        insts.push(Mul {
            rd: rd + 1,
            rs1: rd,
            rs2: rd,
        });
    }
    insts.push(Exit { rs: 0 });
    Program::new(insts)
}

/// Falls off the end of its text.
pub fn runaway() -> Program {
    Program::new(vec![Nop, Nop])
}
