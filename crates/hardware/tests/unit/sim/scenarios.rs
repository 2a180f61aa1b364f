//! # Single-Thread Scenarios
//!
//! Whole-system runs of one workload: normal exit, exit codes, illegal accesses,
//! falling off the text, and the setup errors a configuration can raise.

use pipesim_core::common::{AccessFault, ConfigError, LoadError, ThreadFault};
use pipesim_core::config::{BranchPredictor, CoreType};
use pipesim_core::core::thread::ThreadState;
use pipesim_core::{ExitCause, Simulator};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::config::{config_for, core_config};
use crate::common::builder::program::{
    DATA_BASE, exit_with, runaway, single_load, store_then_load,
};
use crate::common::harness::{TestContext, init_logging};
use crate::common::mocks::loader::{MapLoader, MockLoader};

#[test]
fn test_in_order_single_load_exits_cleanly() {
    let config = core_config(CoreType::InOrder, BranchPredictor::Local, 1, &[]);
    let mut ctx = TestContext::new(config, vec![single_load(DATA_BASE)]);
    let report = ctx.run();

    assert!(report.final_tick > 0);
    assert_eq!(report.final_tick, report.cycles * 1000);
    assert_eq!(report.cause, ExitCause::WorkloadExited);
    assert_eq!(report.exit_code(), 0);
    assert!(matches!(
        report.threads[0].state,
        ThreadState::Exited { code: 0, .. }
    ));
    assert_eq!(report.threads[0].committed, 3);
    assert_eq!(report.threads[0].workload.as_deref(), Some("t0"));
}

#[rstest]
#[case::zero(0, 0)]
#[case::small(5, 5)]
#[case::masked(300, 44)]
#[case::masked_to_zero_still_fails(256, 1)]
fn test_exit_code_of_workload(#[case] code: i64, #[case] expected: i32) {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![exit_with(code)]);
    let report = ctx.run();
    assert_eq!(report.cause, ExitCause::WorkloadExited);
    assert_eq!(report.exit_code(), expected);
}

#[test]
fn test_load_sees_older_store() {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![store_then_load(DATA_BASE, 42)]);
    let report = ctx.run();
    assert_eq!(report.exit_code(), 42);
    assert_eq!(ctx.sim.system().read_word(DATA_BASE), 42);
    let thread = ctx.sim.system().core.thread(0).unwrap();
    assert_eq!(thread.stats.stores, 1);
    assert_eq!(thread.stats.loads, 1);
}

#[test]
fn test_preloaded_memory_is_visible() {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![single_load(DATA_BASE)]);
    ctx.poke_word(DATA_BASE, 0x1234);
    let _ = ctx.run();
    let thread = ctx.sim.system().core.thread(0).unwrap();
    assert_eq!(thread.read_reg(2), 0x1234);
}

#[test]
fn test_access_beyond_memory_faults_the_thread() {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![single_load(0x3000_0000)]);
    let report = ctx.run();
    assert_eq!(report.cause, ExitCause::SegmentationFault { thread: 0 });
    assert_eq!(report.exit_code(), 139);
    let ThreadState::Faulted { fault, .. } = report.threads[0].state else {
        panic!("thread should have faulted: {:?}", report.threads[0].state);
    };
    assert!(matches!(
        fault,
        ThreadFault::SegmentationFault {
            cause: AccessFault::OutOfRangeAccess { .. },
            ..
        }
    ));
}

#[test]
fn test_running_off_the_text_faults() {
    let mut ctx = TestContext::new(config_for(1, &[]), vec![runaway()]);
    let report = ctx.run();
    assert_eq!(report.exit_code(), 139);
    assert!(matches!(
        report.threads[0].state,
        ThreadState::Faulted {
            fault: ThreadFault::FetchOutOfBounds { .. },
            ..
        }
    ));
    assert_eq!(report.threads[0].committed, 2);
}

#[test]
fn test_zero_mshrs_is_rejected_at_setup() {
    init_logging();
    let mut config = config_for(1, &["a"]);
    config.cache.l1d.mshr_count = 0;
    let loader = MapLoader::new().with("a", exit_with(0));
    assert!(matches!(
        Simulator::new(config, &loader),
        Err(ConfigError::InvalidConfiguration { .. })
    ));
}

#[rstest]
#[case::one_thread_two_workloads(1, &["a", "b"])]
#[case::one_thread_no_workload(1, &[])]
#[case::more_workloads_than_threads(2, &["a", "b", "c"])]
fn test_workload_count_mismatch(#[case] threads: usize, #[case] paths: &[&str]) {
    let loader = MapLoader::new()
        .with("a", exit_with(0))
        .with("b", exit_with(0))
        .with("c", exit_with(0));
    let err = Simulator::new(config_for(threads, paths), &loader).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::WorkloadCountMismatch { threads: t, workloads: w }
            if t == threads && w == paths.len()
    ));
}

#[test]
fn test_loader_is_called_once_per_workload() {
    let mut loader = MockLoader::new();
    loader
        .expect_load()
        .withf(|w| w.path == "prog" && w.args == vec!["7".to_string()])
        .times(1)
        .returning(|_| Ok(exit_with(3)));
    let mut config = config_for(1, &[]);
    config
        .workload_paths
        .push(pipesim_core::Workload::new("prog").with_args(["7"]));
    let mut sim = Simulator::new(config, &loader).unwrap();
    assert_eq!(sim.run().exit_code(), 3);
}

#[test]
fn test_loader_error_aborts_setup() {
    let mut loader = MockLoader::new();
    loader.expect_load().times(1).returning(|w| {
        Err(LoadError::Empty {
            path: w.path.clone(),
        })
    });
    let err = Simulator::new(config_for(1, &["empty"]), &loader).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Workload(LoadError::Empty { ref path }) if path == "empty"
    ));
}
