//! # Cache Tests
//!
//! Drives a single cache in front of a timing memory and checks hit/miss
//! behaviour, write-back of dirty victims and replacement order.

use pipesim_core::common::{AccessFault, AddrRange};
use pipesim_core::config::ReplacementPolicy;
use pipesim_core::soc::traits::Responder;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::config::tiny_cache;
use crate::common::harness::CacheRig;

/// 256 B, 2-way, 64 B lines: two sets. Set 0 holds 0x000, 0x080, 0x100, ...
fn rig() -> CacheRig {
    CacheRig::new(&tiny_cache(256, 2, 64, 4, 4), 10)
}

#[test]
fn test_miss_then_hit() {
    let mut rig = rig();
    let p = rig.read(0x140);
    let _ = rig.access(p);
    assert_eq!(rig.cache.stats.misses, 1);
    assert!(rig.cache.contains(0x140));

    let p = rig.read(0x148);
    let _ = rig.access(p);
    assert_eq!(rig.cache.stats.hits, 1);
    assert_eq!(rig.cache.stats.misses, 1);
}

#[test]
fn test_hit_latency_is_tag_plus_data() {
    let mut rig = rig();
    let p = rig.read(0x40);
    let _ = rig.access(p);

    let start = rig.now;
    let p = rig.read(0x40);
    rig.offer(p).unwrap();
    let answered_at = loop {
        let cycle = rig.now;
        if !rig.step().is_empty() {
            break cycle;
        }
    };
    assert_eq!(answered_at, start + 2);
}

#[test]
fn test_read_after_write_same_line() {
    let mut rig = rig();
    let w = rig.write(0x208, 77);
    let rsp = rig.access(w);
    assert!(rsp.fault().is_none());
    assert!(rig.cache.is_dirty(0x208));

    let r = rig.read(0x208);
    assert_eq!(rig.access(r).word(), 77);
}

#[test]
fn test_dirty_victim_written_back_and_reloaded() {
    let mut rig = rig();
    let w = rig.write(0x000, 5);
    let _ = rig.access(w);
    for addr in [0x080, 0x100] {
        let r = rig.read(addr);
        let _ = rig.access(r);
    }
    assert!(!rig.cache.contains(0x000));
    assert_eq!(rig.cache.stats.writebacks, 1);
    assert_eq!(rig.memory.peek(0x000, 8), 5u64.to_le_bytes().to_vec());

    let r = rig.read(0x000);
    assert_eq!(rig.access(r).word(), 5);
}

#[test]
fn test_capacity_and_associativity_bounds() {
    let mut rig = rig();
    for i in 0..16u64 {
        let r = rig.read(i * 64);
        let _ = rig.access(r);
        assert!(rig.cache.valid_lines() <= 4);
        for set in 0..rig.cache.num_sets() {
            assert!(rig.cache.valid_lines_in_set(set) <= rig.cache.ways());
        }
    }
    assert_eq!(rig.cache.valid_lines(), 4);
    assert_eq!(rig.cache.stats.evictions, 12);
}

#[rstest]
#[case::lru(ReplacementPolicy::Lru, 0x080)]
#[case::fifo(ReplacementPolicy::Fifo, 0x000)]
fn test_replacement_victim(#[case] policy: ReplacementPolicy, #[case] evicted: u64) {
    let mut config = tiny_cache(256, 2, 64, 4, 4);
    config.replacement_policy = policy;
    let mut rig = CacheRig::new(&config, 10);
    for addr in [0x000, 0x080, 0x000, 0x100] {
        let r = rig.read(addr);
        let _ = rig.access(r);
    }
    assert!(!rig.cache.contains(evicted));
    assert!(rig.cache.contains(0x100));
}

#[test]
fn test_random_replacement_keeps_new_line() {
    let mut config = tiny_cache(256, 2, 64, 4, 4);
    config.replacement_policy = ReplacementPolicy::Random;
    let mut rig = CacheRig::new(&config, 10);
    for addr in [0x000, 0x080, 0x100, 0x180, 0x200] {
        let r = rig.read(addr);
        let _ = rig.access(r);
        assert!(rig.cache.contains(addr));
    }
    assert_eq!(rig.cache.valid_lines_in_set(0), 2);
}

#[test]
fn test_uncacheable_window_bypasses_array() {
    let mut rig = rig();
    rig.cache.add_uncacheable(AddrRange::new(0x8000, 0x100));
    rig.memory.poke(0x8010, &9u64.to_le_bytes());
    let r = rig.read(0x8010);
    assert_eq!(rig.access(r).word(), 9);
    assert!(!rig.cache.contains(0x8010));
    assert_eq!(rig.cache.stats.uncached, 1);
    assert_eq!(rig.cache.stats.misses, 0);
}

#[test]
fn test_line_crossing_access_is_misaligned() {
    let mut rig = rig();
    let r = rig.read(0x3c);
    let rsp = rig.access(r);
    assert_eq!(
        rsp.fault(),
        Some(AccessFault::Misaligned {
            addr: 0x3c,
            size: 8
        })
    );
}

#[test]
fn test_fill_error_reaches_requester_and_installs_nothing() {
    let mut rig = rig();
    let r = rig.read(0x20_0000);
    let rsp = rig.access(r);
    assert!(matches!(
        rsp.fault(),
        Some(AccessFault::OutOfRangeAccess { .. })
    ));
    assert!(!rig.cache.contains(0x20_0000));
    assert_eq!(rig.cache.stats.fill_errors, 1);
    assert!(!rig.cache.busy());
}
