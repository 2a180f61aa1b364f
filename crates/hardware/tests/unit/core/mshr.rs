//! # MSHR Tests
//!
//! Outstanding-miss limits: the request past the limit is handed back for retry,
//! never dropped.

use pipesim_core::common::{Backpressure, Packet, PacketIdGen};
use pipesim_core::core::units::cache::mshr::MshrTable;
use pipesim_core::soc::traits::Responder;
use pretty_assertions::assert_eq;

use crate::common::builder::config::tiny_cache;
use crate::common::harness::CacheRig;

#[test]
fn test_extra_miss_stalls_then_retries() {
    let mut rig = CacheRig::new(&tiny_cache(1024, 2, 64, 2, 4), 20);
    let a = rig.read(0x000);
    let b = rig.read(0x040);
    let c = rig.read(0x080);
    let c_id = c.id;
    rig.offer(a).unwrap();
    rig.offer(b).unwrap();
    let rejected = rig.offer(c).unwrap_err();
    assert_eq!(rejected.reason, Backpressure::MshrExhausted);
    assert_eq!(rejected.packet.id, c_id);
    assert_eq!(rig.cache.outstanding_misses(), 2);
    assert_eq!(rig.cache.stats.mshr_stalls, 1);

    let first = rig.drain();
    assert_eq!(first.len(), 2);
    assert_eq!(rig.cache.outstanding_misses(), 0);

    rig.offer(rejected.packet).unwrap();
    let second = rig.drain();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, c_id);
}

#[test]
fn test_same_line_requests_merge_up_to_target_limit() {
    let mut rig = CacheRig::new(&tiny_cache(1024, 2, 64, 4, 2), 20);
    let mut ids = Vec::new();
    for off in [0, 8] {
        let p = rig.read(0x100 + off);
        ids.push(p.id);
        rig.offer(p).unwrap();
    }
    let extra = rig.read(0x110);
    let rejected = rig.offer(extra).unwrap_err();
    assert_eq!(rejected.reason, Backpressure::TargetsExhausted);
    assert_eq!(rig.cache.stats.misses, 1);
    assert_eq!(rig.cache.stats.merged, 1);
    assert_eq!(rig.cache.stats.target_stalls, 1);

    let responses = rig.drain();
    let order: Vec<_> = responses.iter().map(|p| p.id).collect();
    assert_eq!(order, ids);
    assert_eq!(rig.memory.stats.reads, 1);
}

#[test]
fn test_merged_write_then_read_observe_order() {
    let mut rig = CacheRig::new(&tiny_cache(1024, 2, 64, 4, 4), 20);
    let w = rig.write(0x200, 0xabcd);
    let r = rig.read(0x200);
    let r_id = r.id;
    rig.offer(w).unwrap();
    rig.offer(r).unwrap();
    let responses = rig.drain();
    let read = responses.iter().find(|p| p.id == r_id).unwrap();
    assert_eq!(read.word(), 0xabcd);
}

#[test]
fn test_table_capacity_and_completion() {
    let mut ids = PacketIdGen::new(9);
    let mut table = MshrTable::new(1, 2);
    let fill = ids.next_id();
    let target = Packet::read(ids.next_id(), 0x40, 8);
    table.allocate(0x40, fill, target, false, 0).unwrap();
    assert!(table.is_full());
    assert!(table.has_block(0x40));

    let other = Packet::read(ids.next_id(), 0x80, 8);
    let err = table.allocate(0x80, ids.next_id(), other, false, 1).unwrap_err();
    assert_eq!(err.reason, Backpressure::MshrExhausted);

    let done = table.complete(fill).unwrap();
    assert_eq!(done.block, 0x40);
    assert_eq!(done.targets.len(), 1);
    assert!(table.is_empty());
    assert!(table.complete(fill).is_none());
}

#[test]
fn test_cache_goes_idle_after_misses() {
    let mut rig = CacheRig::new(&tiny_cache(1024, 2, 64, 4, 4), 5);
    for addr in [0x0, 0x40, 0x80, 0xc0] {
        let p = rig.read(addr);
        rig.offer(p).unwrap();
    }
    assert!(rig.cache.busy());
    assert_eq!(rig.drain().len(), 4);
    assert!(!rig.cache.busy());
}
