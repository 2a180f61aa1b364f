//! # Configuration Tests
//!
//! Tests for configuration defaults, JSON deserialization, unit parsing and
//! validation.

use pipesim_core::common::ConfigError;
use pipesim_core::config::*;
use pipesim_core::isa::Workload;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_config_defaults_match_reference_system() {
    let config = Config::default();
    assert_eq!(config.clock, Frequency(1_000_000_000));
    assert_eq!(config.clock_period(), 1000);
    assert_eq!(config.memory_size, ByteSize(512 * 1024 * 1024));
    assert_eq!(config.cache.l1d.cache_size, ByteSize(32 * 1024));
    assert_eq!(config.cache.l1d.cache_associativity, 4);
    assert_eq!(config.cache.l1d.tag_latency, 2);
    assert_eq!(config.cache.l1d.data_latency, 2);
    assert_eq!(config.cache.l1d.response_latency, 1);
    assert_eq!(config.cache.l1d.mshr_count, 16);
    assert_eq!(config.cache.l1d.targets_per_mshr, 4);
    assert!(config.cache.l2.is_none());
    assert_eq!(config.core.thread_count, 1);
    assert_eq!(config.core.core_type, CoreType::OutOfOrder);
    assert_eq!(config.core.branch_predictor, BranchPredictor::Local);
    assert!(config.max_ticks.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_from_json_camel_case() {
    let json = r#"{
        "clock": "500MHz",
        "memorySize": "64MB",
        "cache": {
            "l1i": {"cacheSize": "16kB", "cacheAssociativity": 2},
            "l1d": {"cacheSize": 8192, "mshrCount": 8, "replacementPolicy": "FIFO"},
            "l2": {"cacheSize": "256kB", "cacheAssociativity": 8, "lineSize": 64}
        },
        "core": {"coreType": "InOrder", "branchPredictor": "Null", "threadCount": 2},
        "memory": {"controller": "DRAM", "tCas": 10},
        "workloadPaths": ["a.s", {"path": "b.s", "args": ["1", "2"]}],
        "maxTicks": 1000000
    }"#;
    let config = Config::from_json(json).unwrap();
    assert_eq!(config.clock_period(), 2000);
    assert_eq!(config.memory_size, ByteSize(64 << 20));
    assert_eq!(config.cache.l1i.cache_size, ByteSize(16 << 10));
    assert_eq!(config.cache.l1i.cache_associativity, 2);
    assert_eq!(config.cache.l1d.mshr_count, 8);
    assert_eq!(config.cache.l1d.replacement_policy, ReplacementPolicy::Fifo);
    assert_eq!(config.cache.l2.as_ref().map(|c| c.cache_associativity), Some(8));
    assert_eq!(config.core.core_type, CoreType::InOrder);
    assert_eq!(config.core.branch_predictor, BranchPredictor::Null);
    assert_eq!(config.memory.controller, MemoryController::Dram);
    assert_eq!(config.memory.t_cas, 10);
    assert_eq!(
        config.workload_paths,
        vec![Workload::new("a.s"), Workload::new("b.s").with_args(["1", "2"])]
    );
    assert_eq!(config.max_ticks, Some(1_000_000));
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_unknown_keys() {
    let err = Config::from_json(r#"{"core": {"robSize": 12}}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[rstest]
#[case("32kB", 32 * 1024)]
#[case("32KiB", 32 * 1024)]
#[case("512MB", 512 * 1024 * 1024)]
#[case("1GB", 1 << 30)]
#[case("64", 64)]
#[case(" 4 kB ", 4096)]
fn test_byte_size_units(#[case] text: &str, #[case] bytes: u64) {
    assert_eq!(text.parse::<ByteSize>().unwrap(), ByteSize(bytes));
}

#[rstest]
#[case("1GHz", 1000)]
#[case("500MHz", 2000)]
#[case("2GHz", 500)]
#[case("1000000000", 1000)]
fn test_clock_period(#[case] text: &str, #[case] period: u64) {
    let freq: Frequency = text.parse().unwrap();
    assert_eq!(freq.period_ticks(), Some(period));
}

#[rstest]
#[case::three_ghz(Frequency(3_000_000_000))]
#[case::seven_hz(Frequency(7))]
#[case::above_tick_rate(Frequency(2_000_000_000_000))]
fn test_clock_without_whole_period(#[case] freq: Frequency) {
    assert_eq!(freq.period_ticks(), None);
}

#[rstest]
#[case("12 parsecs")]
#[case("kB")]
fn test_byte_size_rejects_garbage(#[case] text: &str) {
    assert!(text.parse::<ByteSize>().is_err());
}

fn invalid(mutate: impl FnOnce(&mut Config)) -> ConfigError {
    let mut config = Config::default();
    mutate(&mut config);
    config.validate().unwrap_err()
}

#[rstest]
#[case::zero_mshrs(|c: &mut Config| c.cache.l1d.mshr_count = 0)]
#[case::zero_targets(|c: &mut Config| c.cache.l1i.targets_per_mshr = 0)]
#[case::odd_line(|c: &mut Config| c.cache.l1d.line_size = 48)]
#[case::size_not_multiple(|c: &mut Config| c.cache.l1d.cache_size = ByteSize(1000))]
#[case::zero_threads(|c: &mut Config| c.core.thread_count = 0)]
#[case::too_many_threads(|c: &mut Config| c.core.thread_count = MAX_THREADS + 1)]
#[case::zero_rob(|c: &mut Config| c.core.rob_entries = 0)]
#[case::zero_width(|c: &mut Config| c.core.issue_width = 0)]
#[case::zero_memory(|c: &mut Config| c.memory_size = ByteSize(0))]
#[case::zero_clock(|c: &mut Config| c.clock = Frequency(0))]
#[case::zero_budget(|c: &mut Config| c.max_ticks = Some(0))]
#[case::budget_below_one_cycle(|c: &mut Config| c.max_ticks = Some(999))]
#[case::fractional_period(|c: &mut Config| c.clock = Frequency(3_000_000_000))]
#[case::intc_overlaps_memory(|c: &mut Config| c.interrupts.base = 0x1000)]
#[case::bad_history(|c: &mut Config| c.core.local_history_entries = 100)]
fn test_validation_rejects(#[case] mutate: fn(&mut Config)) {
    assert!(matches!(
        invalid(mutate),
        ConfigError::InvalidConfiguration { .. }
    ));
}

#[test]
fn test_l1_line_larger_than_l2_rejected() {
    let err = invalid(|c| {
        let mut l2 = CacheConfig::default();
        l2.line_size = 32;
        l2.cache_size = ByteSize(64 * 1024);
        c.cache.l2 = Some(l2);
    });
    assert!(err.to_string().contains("l2 line size"));
}

#[test]
fn test_cache_geometry() {
    let c = CacheConfig::default();
    assert_eq!(c.num_sets(), 32 * 1024 / (64 * 4));
    assert_eq!(c.num_lines(), 512);
}

#[test]
fn test_interrupt_window_spans_threads() {
    let mut config = Config::default();
    config.core.thread_count = 4;
    let range = config.interrupt_range();
    assert_eq!(range.start, config.interrupts.base);
    assert_eq!(range.size, 32);
}
