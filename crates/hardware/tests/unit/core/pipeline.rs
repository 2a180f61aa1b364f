//! # Pipeline Structure Tests
//!
//! ROB dependence tracking and store disambiguation, the post-commit store buffer
//! and the fetch unit's grouping and steering.

use pipesim_core::common::{AccessFault, PacketIdGen, ThreadFault};
use pipesim_core::config::{BranchPredictor as Kind, CoreConfig};
use pipesim_core::core::pipeline::{
    DynInst, FetchUnit, InstState, Operand, Rob, StoreBuffer, StoreSearch, ThreadPipeline,
};
use pipesim_core::core::units::bru::BranchPredictorWrapper;
use pipesim_core::isa::{Instruction, Program};
use pretty_assertions::assert_eq;

use Instruction::*;

fn at(seq: u64, inst: Instruction) -> DynInst {
    DynInst::new(seq, 0x1000 + seq * 4, inst, 0)
}

#[test]
fn test_operand_sees_youngest_older_producer() {
    let mut rob = Rob::new(8);
    rob.allocate(at(0, Li { rd: 3, imm: 1 })).unwrap();
    rob.allocate(at(1, Li { rd: 3, imm: 2 })).unwrap();
    rob.allocate(at(
        2,
        Add {
            rd: 4,
            rs1: 3,
            rs2: 5,
        },
    ))
    .unwrap();

    assert_eq!(rob.operand(2, 3), Operand::Pending);
    assert_eq!(rob.operand(2, 5), Operand::Architectural);
    assert_eq!(rob.operand(2, 0), Operand::Forwarded(0));

    let producer = rob.get_mut(1).unwrap();
    producer.state = InstState::Complete;
    producer.result = 2;
    assert_eq!(rob.operand(2, 3), Operand::Forwarded(2));
}

#[test]
fn test_faulted_producer_never_forwards() {
    let mut rob = Rob::new(4);
    let mut load = at(
        0,
        Ld {
            rd: 7,
            base: 1,
            offset: 0,
        },
    );
    load.state = InstState::Complete;
    load.fault = Some(ThreadFault::SegmentationFault {
        pc: load.pc,
        cause: AccessFault::Unmapped { addr: 0 },
    });
    rob.allocate(load).unwrap();
    rob.allocate(at(1, Exit { rs: 7 })).unwrap();
    assert_eq!(rob.operand(1, 7), Operand::Pending);
}

#[test]
fn test_load_waits_for_unresolved_older_store() {
    let mut rob = Rob::new(8);
    rob.allocate(at(
        0,
        Sd {
            src: 2,
            base: 1,
            offset: 0,
        },
    ))
    .unwrap();
    rob.allocate(at(
        1,
        Ld {
            rd: 3,
            base: 1,
            offset: 0,
        },
    ))
    .unwrap();
    assert_eq!(rob.search_stores(1, 0x80), StoreSearch::Unresolved);

    let store = rob.get_mut(0).unwrap();
    store.addr = Some(0x80);
    store.result = 11;
    assert_eq!(rob.search_stores(1, 0x80), StoreSearch::Forward(11));
    assert_eq!(rob.search_stores(1, 0x88), StoreSearch::Clear);
}

#[test]
fn test_flush_after_keeps_older_entries() {
    let mut rob = Rob::new(8);
    for seq in 0..5 {
        rob.allocate(at(seq, Nop)).unwrap();
    }
    assert_eq!(rob.flush_after(1), 3);
    let left: Vec<u64> = rob.iter().map(|d| d.seq).collect();
    assert_eq!(left, vec![0, 1]);
    assert!(rob.find_mut(1).is_some());
    assert!(rob.find_mut(3).is_none());
}

#[test]
fn test_rob_refuses_when_full() {
    let mut rob = Rob::new(2);
    rob.allocate(at(0, Nop)).unwrap();
    rob.allocate(at(1, Nop)).unwrap();
    let back = rob.allocate(at(2, Nop)).unwrap_err();
    assert_eq!(back.seq, 2);
    assert!(rob.is_full());
}

#[test]
fn test_store_buffer_drains_in_order() {
    let mut ids = PacketIdGen::new(0);
    let mut sb = StoreBuffer::new(2);
    assert!(sb.push(0x1000, 0x40, 1));
    assert!(sb.push(0x1004, 0x48, 2));
    assert!(!sb.push(0x1008, 0x50, 3));

    let first = ids.next_id();
    let entry = sb.next_unsent().unwrap();
    assert_eq!(entry.addr, 0x40);
    entry.sent = Some(first);
    assert_eq!(sb.next_unsent().map(|e| e.addr), Some(0x48));

    let acked = sb.acknowledge(first).unwrap();
    assert_eq!(acked.data, 1);
    assert_eq!(sb.len(), 1);
    assert!(sb.acknowledge(first).is_none());
}

fn loop_program() -> Program {
    Program::new(vec![
        Li { rd: 1, imm: 3 },
        Addi {
            rd: 1,
            rs1: 1,
            imm: -1,
        },
        Bnez { rs: 1, target: 1 },
        Exit { rs: 0 },
    ])
}

fn predictor(kind: Kind) -> BranchPredictorWrapper {
    BranchPredictorWrapper::new(&CoreConfig {
        branch_predictor: kind,
        ..CoreConfig::default()
    })
}

#[test]
fn test_fetch_blocks_on_branch_without_prediction() {
    let program = loop_program();
    let mut ids = PacketIdGen::new(0);
    let mut fetch = FetchUnit::new(4);
    let _ = fetch.redirect(program.entry_pc());
    assert!(fetch.can_fetch());

    let id = ids.next_id();
    fetch.set_pending(id);
    assert!(!fetch.can_fetch());
    let mut seq = 0;
    let n = fetch
        .accept(id, 4, &program, &predictor(Kind::Null), &mut seq, 10)
        .unwrap();
    assert_eq!(n, 3);
    assert!(fetch.is_blocked_on(2));
    assert!(!fetch.can_fetch());

    assert!(fetch.pop_ready(10).is_none());
    assert_eq!(fetch.pop_ready(11).map(|d| d.seq), Some(0));
}

#[test]
fn test_fetch_follows_not_taken_prediction() {
    let program = loop_program();
    let mut ids = PacketIdGen::new(0);
    let mut fetch = FetchUnit::new(4);
    let _ = fetch.redirect(program.entry_pc());
    let id = ids.next_id();
    fetch.set_pending(id);
    let mut seq = 0;
    let n = fetch
        .accept(id, 4, &program, &predictor(Kind::Local), &mut seq, 0)
        .unwrap();
    // A cold local predictor says not taken, so the group runs on to `exit`.
    assert_eq!(n, 4);
    assert!(!fetch.can_fetch());
    assert_eq!(fetch.buffered(), 4);
}

#[test]
fn test_stale_response_after_redirect_is_dropped() {
    let program = loop_program();
    let mut ids = PacketIdGen::new(0);
    let mut fetch = FetchUnit::new(4);
    let _ = fetch.redirect(program.entry_pc());
    let id = ids.next_id();
    fetch.set_pending(id);
    let _ = fetch.redirect(program.pc_of(1));
    let mut seq = 0;
    assert_eq!(
        fetch.accept(id, 4, &program, &predictor(Kind::Local), &mut seq, 0),
        None
    );
    assert_eq!(seq, 0);
    assert!(fetch.can_fetch());
    assert_eq!(fetch.pc, program.pc_of(1));
}

#[test]
fn test_fetch_group_stops_at_line_and_program_end() {
    let program = loop_program();
    let mut fetch = FetchUnit::new(8);
    let _ = fetch.redirect(program.entry_pc());
    assert_eq!(fetch.group_len(&program, 64), 4);
    let _ = fetch.redirect(program.entry_pc() + 4);
    assert_eq!(fetch.group_len(&program, 8), 1);
}

#[test]
fn test_thread_pipeline_squash_and_flush() {
    let config = CoreConfig::default();
    let mut pipe = ThreadPipeline::new(&config);
    let _ = pipe.flush_to(0x1000);
    for _ in 0..4 {
        let seq = pipe.alloc_seq();
        pipe.rob.allocate(at(seq, Nop)).unwrap();
    }
    assert_eq!(pipe.squash_after(1, 0x2000), 2);
    assert_eq!(pipe.fetch.pc, 0x2000);
    assert_eq!(pipe.flush_to(0x3000), 2);
    assert!(pipe.rob.is_empty());
    let _ = pipe.shut_down();
    assert!(!pipe.fetch.can_fetch());
}
