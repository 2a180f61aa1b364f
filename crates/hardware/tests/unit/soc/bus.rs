//! # Bus Tests
//!
//! Routing by address window, round-robin arbitration, per-port response order and
//! unmapped accesses.

use pipesim_core::common::{
    AccessFault, AddrRange, Backpressure, Packet, PacketId, PacketIdGen, Rejected,
};
use pipesim_core::soc::interconnect::{SystemBus, Target};
use pretty_assertions::assert_eq;

const INTC: AddrRange = AddrRange::new(0x4000_0000, 16);

/// Bus with `ports` connected cpu-side ports, memory as default route and the
/// interrupt controller window.
fn bus(ports: usize, latency: u64, depth: usize) -> SystemBus {
    let mut bus = SystemBus::new("membus", latency, depth);
    for p in 0..ports {
        let idx = bus.add_cpu_port();
        let _ = bus.connect_cpu_port(idx, p);
    }
    let _ = bus.add_mem_port(Target::Memory, None);
    let _ = bus.add_mem_port(Target::Interrupts, Some(INTC));
    bus
}

/// Runs arbitration at `now`, accepting everything, and returns the grants.
fn grant_all(bus: &mut SystemBus, now: u64) -> Vec<(Target, Packet)> {
    let mut granted = Vec::new();
    bus.arbitrate(now, |target, pkt| {
        granted.push((target, pkt));
        Ok(())
    });
    granted
}

#[test]
fn test_routes_by_window_then_default() {
    let bus = bus(1, 1, 4);
    assert!(bus.validate().is_ok());
    assert_eq!(bus.route(0x1000), Some(Target::Memory));
    assert_eq!(bus.route(0x4000_0008), Some(Target::Interrupts));
    assert_eq!(bus.route(0x4000_0010), Some(Target::Memory));
}

#[test]
fn test_request_waits_bus_latency() {
    let mut bus = bus(1, 3, 4);
    let mut ids = PacketIdGen::new(1);
    bus.try_request(0, Packet::read(ids.next_id(), 0x40, 8), 10)
        .unwrap();
    assert!(grant_all(&mut bus, 12).is_empty());
    assert_eq!(grant_all(&mut bus, 13).len(), 1);
}

#[test]
fn test_responses_return_in_request_order_per_port() {
    let mut bus = bus(1, 0, 4);
    let mut ids = PacketIdGen::new(1);
    let a = ids.next_id();
    let b = ids.next_id();
    bus.try_request(0, Packet::read(a, 0x00, 8), 0).unwrap();
    bus.try_request(0, Packet::read(b, 0x40, 8), 0).unwrap();

    // One grant per target per cycle.
    let mut granted = grant_all(&mut bus, 0);
    granted.extend(grant_all(&mut bus, 1));
    assert_eq!(granted.len(), 2);

    // The target answers the younger request first.
    let (_, mut second) = granted.pop().unwrap();
    let (_, mut first) = granted.pop().unwrap();
    second.respond(&[2; 8]);
    assert!(bus.respond(second, 2));
    assert!(bus.deliver(2).is_empty());

    first.respond(&[1; 8]);
    assert!(bus.respond(first, 5));
    let order: Vec<PacketId> = bus.deliver(5).into_iter().map(|(_, p)| p.id).collect();
    assert_eq!(order, vec![a, b]);
    assert!(!bus.busy());
}

#[test]
fn test_round_robin_between_ports() {
    let mut bus = bus(2, 0, 4);
    let mut ids = PacketIdGen::new(1);
    for port in [0, 1] {
        for i in 0..2u64 {
            let addr = 0x1000 * (port as u64 + 1) + i * 0x40;
            bus.try_request(port, Packet::read(ids.next_id(), addr, 8), 0)
                .unwrap();
        }
    }
    let mut winners = Vec::new();
    for now in 0..4 {
        for (_, pkt) in grant_all(&mut bus, now) {
            winners.push(pkt.addr / 0x1000 - 1);
        }
    }
    assert_eq!(winners, vec![0, 1, 0, 1]);
}

#[test]
fn test_distinct_targets_granted_in_same_cycle() {
    let mut bus = bus(2, 0, 4);
    let mut ids = PacketIdGen::new(1);
    bus.try_request(0, Packet::read(ids.next_id(), 0x100, 8), 0)
        .unwrap();
    bus.try_request(1, Packet::read(ids.next_id(), 0x4000_0000, 8), 0)
        .unwrap();
    let granted: Vec<Target> = grant_all(&mut bus, 0).into_iter().map(|(t, _)| t).collect();
    assert_eq!(granted, vec![Target::Memory, Target::Interrupts]);
}

#[test]
fn test_refused_request_is_retried() {
    let mut bus = bus(1, 0, 4);
    let mut ids = PacketIdGen::new(1);
    let id = ids.next_id();
    bus.try_request(0, Packet::read(id, 0x80, 8), 0).unwrap();
    bus.arbitrate(0, |_, pkt| Err(Rejected::new(pkt, Backpressure::Busy)));
    assert_eq!(bus.stats.target_refusals, 1);
    let granted = grant_all(&mut bus, 1);
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].1.id, id);
    assert_eq!(bus.stats.grants, 1);
}

#[test]
fn test_full_port_queue_refuses() {
    let mut bus = bus(1, 0, 1);
    let mut ids = PacketIdGen::new(1);
    bus.try_request(0, Packet::read(ids.next_id(), 0x0, 8), 0)
        .unwrap();
    let err = bus
        .try_request(0, Packet::read(ids.next_id(), 0x8, 8), 0)
        .unwrap_err();
    assert_eq!(err.reason, Backpressure::QueueFull);
    assert_eq!(bus.stats.queue_full, 1);
}

#[test]
fn test_unmapped_address_answered_by_bus() {
    let mut bus = SystemBus::new("l2bus", 0, 4);
    let port = bus.add_cpu_port();
    let _ = bus.connect_cpu_port(port, 0);
    let _ = bus.add_mem_port(Target::Interrupts, Some(INTC));
    let mut ids = PacketIdGen::new(1);
    bus.try_request(port, Packet::read(ids.next_id(), 0x2000, 8), 0)
        .unwrap();
    assert!(grant_all(&mut bus, 0).is_empty());
    let delivered = bus.deliver(0);
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered[0].1.fault(),
        Some(AccessFault::Unmapped { addr: 0x2000 })
    );
    assert_eq!(bus.stats.unmapped, 1);
}

#[test]
fn test_unknown_response_is_dropped() {
    let mut bus = bus(1, 0, 4);
    let mut ids = PacketIdGen::new(1);
    let mut stray = Packet::read(ids.next_id(), 0, 8);
    stray.respond(&[]);
    assert!(!bus.respond(stray, 0));
}

#[test]
fn test_validation_catches_bad_wiring() {
    let mut no_targets = SystemBus::new("a", 1, 4);
    let p = no_targets.add_cpu_port();
    let _ = no_targets.connect_cpu_port(p, 0);
    assert!(no_targets.validate().is_err());

    let mut two_defaults = bus(1, 1, 4);
    let _ = two_defaults.add_mem_port(Target::Cache(3), None);
    assert!(two_defaults.validate().is_err());

    let mut overlap = bus(1, 1, 4);
    let _ = overlap.add_mem_port(Target::Cache(3), Some(AddrRange::new(0x4000_0008, 8)));
    assert!(overlap.validate().is_err());

    let mut dangling = bus(1, 1, 4);
    let _ = dangling.add_cpu_port();
    assert!(dangling.validate().is_err());
}
