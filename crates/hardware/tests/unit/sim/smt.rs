//! # SMT Scenarios
//!
//! Several thread contexts share the fetch, issue and commit bandwidth and the data
//! cache. Each keeps private architectural state and a private outcome.

use pipesim_core::common::{AccessFault, ThreadFault};
use pipesim_core::core::thread::ThreadState;
use pipesim_core::isa::Program;
use pipesim_core::ExitCause;
use pretty_assertions::assert_eq;

use crate::common::builder::config::config_for;
use crate::common::builder::program::{DATA_BASE, exit_with, single_load, strided_sum};
use crate::common::harness::TestContext;

const WORDS: u64 = 64;
const STRIDE: u64 = 64;

fn summing_thread(base: u64) -> Program {
    strided_sum(WORDS as i64, STRIDE as i64).with_reg(10, base)
}

fn preload(ctx: &mut TestContext, base: u64, scale: u64) -> u64 {
    let mut sum = 0;
    for i in 0..WORDS {
        let value = (i + 1) * scale;
        ctx.poke_word(base + i * STRIDE, value);
        sum += value;
    }
    sum
}

#[test]
fn test_two_threads_keep_private_registers() {
    let second = DATA_BASE + 0x10_0000;
    let mut ctx = TestContext::new(
        config_for(2, &[]),
        vec![summing_thread(DATA_BASE), summing_thread(second)],
    );
    let sum0 = preload(&mut ctx, DATA_BASE, 1);
    let sum1 = preload(&mut ctx, second, 3);
    let report = ctx.run();

    assert_eq!(report.cause, ExitCause::WorkloadExited);
    assert_eq!(report.exit_code(), 0);
    let core = &ctx.sim.system().core;
    assert_eq!(core.thread(0).unwrap().read_reg(3), sum0);
    assert_eq!(core.thread(1).unwrap().read_reg(3), sum1);
    assert!(report.threads.iter().all(|t| t.committed > WORDS * 5));
}

#[test]
fn test_two_threads_overlap_in_time() {
    let second = DATA_BASE + 0x10_0000;
    let mut single = TestContext::new(config_for(1, &[]), vec![summing_thread(DATA_BASE)]);
    let alone = single.run().final_tick;

    let mut dual = TestContext::new(
        config_for(2, &[]),
        vec![summing_thread(DATA_BASE), summing_thread(second)],
    );
    let together = dual.run().final_tick;

    assert!(together >= alone);
    assert!(
        together <= 2 * alone,
        "two threads took {together} ticks, one took {alone}"
    );
}

#[test]
fn test_fault_in_one_thread_leaves_the_other_alone() {
    let mut ctx = TestContext::new(
        config_for(2, &[]),
        vec![exit_with(0), single_load(0x3000_0000)],
    );
    let report = ctx.run();

    assert_eq!(report.cause, ExitCause::SegmentationFault { thread: 1 });
    assert_eq!(report.exit_code(), 139);
    assert!(matches!(
        report.threads[0].state,
        ThreadState::Exited { code: 0, .. }
    ));
    assert!(matches!(
        report.threads[1].state,
        ThreadState::Faulted {
            fault: ThreadFault::SegmentationFault {
                cause: AccessFault::OutOfRangeAccess { .. },
                ..
            },
            ..
        }
    ));
}

#[test]
fn test_first_nonzero_exit_code_wins() {
    let mut ctx = TestContext::new(
        config_for(3, &[]),
        vec![exit_with(0), exit_with(7), exit_with(9)],
    );
    assert_eq!(ctx.run().exit_code(), 7);
}

#[test]
fn test_surplus_contexts_stay_idle() {
    let mut ctx = TestContext::new(config_for(4, &[]), vec![exit_with(2)]);
    let report = ctx.run();
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.threads.len(), 4);
    assert!(report.threads[1..]
        .iter()
        .all(|t| t.state == ThreadState::Idle && t.workload.is_none()));
}
