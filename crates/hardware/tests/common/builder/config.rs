use pipesim_core::config::{BranchPredictor, ByteSize, CacheConfig, Config, CoreType};
use pipesim_core::isa::Workload;

/// Default configuration with `threads` contexts and one workload per path.
pub fn config_for(threads: usize, paths: &[&str]) -> Config {
    let mut config = Config::default();
    config.core.thread_count = threads;
    config.workload_paths = paths.iter().map(|p| Workload::new(*p)).collect();
    config.max_ticks = Some(50_000_000_000);
    config
}

/// Same as [`config_for`] with a chosen core type and predictor.
pub fn core_config(
    core: CoreType,
    predictor: BranchPredictor,
    threads: usize,
    paths: &[&str],
) -> Config {
    let mut config = config_for(threads, paths);
    config.core.core_type = core;
    config.core.branch_predictor = predictor;
    config
}

/// A tiny cache that forces evictions quickly.
pub fn tiny_cache(size: u64, ways: usize, line: usize, mshrs: usize, targets: usize) -> CacheConfig {
    CacheConfig {
        cache_size: ByteSize(size),
        cache_associativity: ways,
        line_size: line,
        tag_latency: 1,
        data_latency: 1,
        response_latency: 1,
        mshr_count: mshrs,
        targets_per_mshr: targets,
        ..CacheConfig::default()
    }
}
