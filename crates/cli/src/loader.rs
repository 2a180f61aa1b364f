//! Text-listing workload loader.
//!
//! A listing holds one instruction per line:
//!
//! ```text
//! .entry main          # optional, defaults to the first instruction
//! .handler on_irq      # optional interrupt handler
//! .text 0x2000         # optional text base
//! main:
//!     li   r1, 0x100
//!     ld   r2, 8(r1)
//! loop: addi r2, r2, -1
//!     bnez r2, loop
//!     exit r0
//! on_irq:
//!     iret
//! ```
//!
//! Branch targets are labels or instruction indices. Numeric workload arguments are
//! preloaded into `r10`, `r11`, and so on.

use std::collections::HashMap;
use std::fs;

use pipesim_core::common::LoadError;
use pipesim_core::isa::{Instruction, NUM_REGS, Program, Reg, Workload, WorkloadLoader};

/// First register that receives workload arguments.
const ARG_REG_BASE: usize = 10;

/// Loads workloads from listing files on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListingLoader;

impl WorkloadLoader for ListingLoader {
    fn load(&self, workload: &Workload) -> Result<Program, LoadError> {
        let text = fs::read_to_string(&workload.path).map_err(|e| LoadError::Unreadable {
            path: workload.path.clone(),
            reason: e.to_string(),
        })?;
        let program = parse_listing(&workload.path, &text)?;
        apply_args(program, workload)
    }
}

/// Places numeric arguments in `r10` upward.
fn apply_args(mut program: Program, workload: &Workload) -> Result<Program, LoadError> {
    if workload.args.len() > NUM_REGS - ARG_REG_BASE {
        return Err(LoadError::Syntax {
            path: workload.path.clone(),
            line: 0,
            reason: format!("at most {} arguments", NUM_REGS - ARG_REG_BASE),
        });
    }
    for (i, arg) in workload.args.iter().enumerate() {
        let value = parse_int(arg).ok_or_else(|| LoadError::Syntax {
            path: workload.path.clone(),
            line: 0,
            reason: format!("argument {arg:?} is not a number"),
        })?;
        program = program.with_reg((ARG_REG_BASE + i) as Reg, value as u64);
    }
    Ok(program)
}

/// Parses a listing into a checked [`Program`].
///
/// # Errors
///
/// Returns [`LoadError::Syntax`] with the 1-based line of the first problem, or
/// [`LoadError::Empty`] when the listing has no instructions.
pub fn parse_listing(path: &str, text: &str) -> Result<Program, LoadError> {
    let err = |line: usize, reason: String| LoadError::Syntax {
        path: path.to_string(),
        line,
        reason,
    };

    // Pass 1: labels, directives and instruction lines.
    let mut labels: HashMap<&str, usize> = HashMap::new();
    let mut body: Vec<(usize, &str)> = Vec::new();
    let mut entry = None;
    let mut handler = None;
    let mut text_base = None;
    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let mut line = raw.split('#').next().unwrap_or("").trim();
        if let Some(rest) = line.strip_prefix('.') {
            let mut parts = rest.split_whitespace();
            let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(err(line_no, format!("malformed directive `{line}`")));
            };
            match name {
                "entry" => entry = Some((line_no, value)),
                "handler" => handler = Some((line_no, value)),
                "text" => {
                    let base = parse_int(value)
                        .filter(|b| *b >= 0 && b % 4 == 0)
                        .ok_or_else(|| err(line_no, format!("bad text base `{value}`")))?;
                    text_base = Some(base as u64);
                }
                other => return Err(err(line_no, format!("unknown directive `.{other}`"))),
            }
            continue;
        }
        while let Some((label, rest)) = line.split_once(':') {
            let label = label.trim();
            if !is_ident(label) {
                return Err(err(line_no, format!("bad label `{label}`")));
            }
            if labels.insert(label, body.len()).is_some() {
                return Err(err(line_no, format!("label `{label}` defined twice")));
            }
            line = rest.trim();
        }
        if !line.is_empty() {
            body.push((line_no, line));
        }
    }

    // Pass 2: instructions.
    let mut instructions = Vec::with_capacity(body.len());
    for &(line_no, line) in &body {
        let inst = parse_instruction(line, &labels).map_err(|reason| err(line_no, reason))?;
        instructions.push(inst);
    }

    let mut program = Program::new(instructions);
    if let Some(base) = text_base {
        program = program.with_text_base(base);
    }
    let resolve = |(line_no, name): (usize, &str)| {
        labels
            .get(name)
            .copied()
            .ok_or_else(|| err(line_no, format!("unknown label `{name}`")))
    };
    if let Some(e) = entry {
        program.entry = resolve(e)?;
    }
    if let Some(h) = handler {
        program = program.with_handler(resolve(h)?);
    }
    program.check(path)?;
    Ok(program)
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_int(s: &str) -> Option<i64> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()? as i64,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if neg { value.wrapping_neg() } else { value })
}

fn parse_reg(s: &str) -> Result<Reg, String> {
    s.strip_prefix('r')
        .or_else(|| s.strip_prefix('x'))
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&n| n < NUM_REGS)
        .map(|n| n as Reg)
        .ok_or_else(|| format!("bad register `{s}`"))
}

fn parse_imm(s: &str) -> Result<i64, String> {
    parse_int(s).ok_or_else(|| format!("bad immediate `{s}`"))
}

/// `offset(rN)`.
fn parse_mem(s: &str) -> Result<(i64, Reg), String> {
    let (offset, rest) = s
        .split_once('(')
        .ok_or_else(|| format!("expected offset(reg), got `{s}`"))?;
    let base = rest
        .strip_suffix(')')
        .ok_or_else(|| format!("missing `)` in `{s}`"))?;
    let offset = if offset.trim().is_empty() {
        0
    } else {
        parse_imm(offset.trim())?
    };
    Ok((offset, parse_reg(base.trim())?))
}

fn parse_target(s: &str, labels: &HashMap<&str, usize>) -> Result<usize, String> {
    if let Some(&idx) = labels.get(s) {
        return Ok(idx);
    }
    s.parse::<usize>()
        .map_err(|_| format!("unknown branch target `{s}`"))
}

fn parse_instruction(line: &str, labels: &HashMap<&str, usize>) -> Result<Instruction, String> {
    let (mnemonic, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(m, r)| (m, r.trim()));
    let ops: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };
    let arity = |n: usize| {
        if ops.len() == n {
            Ok(())
        } else {
            Err(format!("`{mnemonic}` takes {n} operand(s), got {}", ops.len()))
        }
    };

    let inst = match mnemonic.to_ascii_lowercase().as_str() {
        "nop" => {
            arity(0)?;
            Instruction::Nop
        }
        "iret" => {
            arity(0)?;
            Instruction::Iret
        }
        "li" => {
            arity(2)?;
            Instruction::Li {
                rd: parse_reg(ops[0])?,
                imm: parse_imm(ops[1])?,
            }
        }
        op @ ("add" | "sub" | "mul") => {
            arity(3)?;
            let (rd, rs1, rs2) = (parse_reg(ops[0])?, parse_reg(ops[1])?, parse_reg(ops[2])?);
            match op {
                "add" => Instruction::Add { rd, rs1, rs2 },
                "sub" => Instruction::Sub { rd, rs1, rs2 },
                _ => Instruction::Mul { rd, rs1, rs2 },
            }
        }
        "addi" => {
            arity(3)?;
            Instruction::Addi {
                rd: parse_reg(ops[0])?,
                rs1: parse_reg(ops[1])?,
                imm: parse_imm(ops[2])?,
            }
        }
        "ld" => {
            arity(2)?;
            let (offset, base) = parse_mem(ops[1])?;
            Instruction::Ld {
                rd: parse_reg(ops[0])?,
                base,
                offset,
            }
        }
        "sd" => {
            arity(2)?;
            let (offset, base) = parse_mem(ops[1])?;
            Instruction::Sd {
                src: parse_reg(ops[0])?,
                base,
                offset,
            }
        }
        "beqz" | "bnez" => {
            arity(2)?;
            let rs = parse_reg(ops[0])?;
            let target = parse_target(ops[1], labels)?;
            if mnemonic.eq_ignore_ascii_case("beqz") {
                Instruction::Beqz { rs, target }
            } else {
                Instruction::Bnez { rs, target }
            }
        }
        "j" => {
            arity(1)?;
            Instruction::J {
                target: parse_target(ops[0], labels)?,
            }
        }
        "exit" => {
            arity(1)?;
            Instruction::Exit {
                rs: parse_reg(ops[0])?,
            }
        }
        other => return Err(format!("unknown instruction `{other}`")),
    };
    Ok(inst)
}
