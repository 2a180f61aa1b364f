//! # Interrupt Delivery Scenarios
//!
//! Interrupts posted by the harness or by the workload itself through the PIO
//! window are taken at commit, run the handler and resume where they left off.

use pipesim_core::config::{BranchPredictor, CoreType};
use pipesim_core::isa::{Instruction, Program};
use pipesim_core::soc::devices::InterruptClass;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::config::{config_for, core_config};
use crate::common::builder::program::{countdown, countdown_with_handler};
use crate::common::harness::TestContext;

use Instruction::*;

#[rstest]
#[case::out_of_order(CoreType::OutOfOrder)]
#[case::in_order(CoreType::InOrder)]
fn test_handler_runs_and_resumes(#[case] core: CoreType) {
    let config = core_config(core, BranchPredictor::Local, 1, &[]);
    let mut ctx = TestContext::new(config, vec![countdown_with_handler(2000, 5)]);
    ctx.sim.schedule_interrupt(100, 0, InterruptClass::Timer).unwrap();
    let report = ctx.run();

    assert_eq!(report.exit_code(), 5);
    let thread = ctx.sim.system().core.thread(0).unwrap();
    assert_eq!(thread.stats.interrupts, 1);
    assert!(!thread.in_handler);
    assert_eq!(ctx.sim.system().interrupts.stats.delivered, 1);
}

#[test]
fn test_each_interrupt_is_delivered_once() {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![countdown_with_handler(2000, 5)]);
    ctx.sim.schedule_interrupt(100, 0, InterruptClass::Timer).unwrap();
    ctx.sim.schedule_interrupt(400, 0, InterruptClass::External).unwrap();
    let report = ctx.run();

    assert_eq!(report.exit_code(), 10);
    let intc = &ctx.sim.system().interrupts;
    assert_eq!(intc.stats.posted, 2);
    assert_eq!(intc.stats.delivered, 2);
    assert_eq!(intc.pending(0), 0);
}

#[test]
fn test_without_handler_interrupt_stays_pending() {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![countdown(500)]);
    ctx.sim.schedule_interrupt(50, 0, InterruptClass::Software).unwrap();
    let report = ctx.run();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(ctx.sim.system().interrupts.stats.delivered, 0);
    assert_eq!(ctx.sim.system().interrupts.pending(0), 1);
}

#[test]
fn test_interrupt_for_missing_thread_is_rejected() {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![countdown(5)]);
    assert!(ctx.sim.schedule_interrupt(10, 1, InterruptClass::Timer).is_err());
}

#[test]
fn test_workload_posts_its_own_interrupt() {
    let base = intc_base();
    let program = Program::new(vec![
        Li {
            rd: 1,
            imm: base as i64,
        },
        Li { rd: 2, imm: 0 },
        Sd {
            src: 2,
            base: 1,
            offset: 0,
        },
        Li { rd: 3, imm: 500 },
        Addi {
            rd: 3,
            rs1: 3,
            imm: -1,
        },
        Bnez { rs: 3, target: 4 },
        Exit { rs: 20 },
        // handler:
        Addi {
            rd: 20,
            rs1: 20,
            imm: 9,
        },
        Iret,
    ])
    .with_handler(7);
    let mut ctx = TestContext::new(config_for(1, &[]), vec![program]);
    let report = ctx.run();

    assert_eq!(report.exit_code(), 9);
    let intc = &ctx.sim.system().interrupts;
    assert_eq!(intc.stats.pio_accesses, 1);
    assert_eq!(intc.stats.delivered, 1);
    // The PIO window is never cached.
    assert!(!ctx.sim.system().l1d().contains(base));
}

fn intc_base() -> u64 {
    config_for(1, &[]).interrupts.base
}
