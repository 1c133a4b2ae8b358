// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Unit tests for the cache controller state machine

use crate::core::cache::{
    ByteMask, Controller, ControllerState, CpuRequest, CpuResponse, Geometry,
};
use crate::core::config::InitPattern;
use crate::core::memory::{BackingStore, BlockMemory, BlockRequest, BlockResponse};

const LATENCY: u32 = 2;

/// Backing store that records every accepted transaction
struct RecordingMemory {
    inner: BackingStore,
    accepted: Vec<BlockRequest>,
}

impl BlockMemory for RecordingMemory {
    fn ready(&self) -> bool {
        self.inner.ready()
    }

    fn request(&mut self, request: BlockRequest) -> bool {
        let accepted = self.inner.request(request.clone());
        if accepted {
            self.accepted.push(request);
        }
        accepted
    }

    fn take_response(&mut self) -> Option<BlockResponse> {
        self.inner.take_response()
    }
}

/// 16-bit addresses, 1KB of 16-byte blocks
fn setup(ways: usize) -> (Controller, RecordingMemory) {
    let geometry = Geometry::new(16, 16, 1024 / (16 * ways), ways).unwrap();
    let memory = RecordingMemory {
        inner: BackingStore::new(geometry.memory_size(), 16, LATENCY, InitPattern::Address),
        accepted: Vec::new(),
    };
    (Controller::new(geometry), memory)
}

/// Bytes between two addresses that map to the same set
fn set_span(controller: &Controller) -> u32 {
    (controller.geometry().sets() * controller.geometry().block_size()) as u32
}

struct Run {
    response: CpuResponse,
    cycles: u64,
    states: Vec<ControllerState>,
}

fn run(controller: &mut Controller, memory: &mut RecordingMemory, request: CpuRequest) -> Run {
    let mut input = Some(request);
    let mut states = Vec::new();

    for cycle in 1..=1000 {
        let out = controller.tick(input.take(), memory);
        memory.inner.tick();
        states.push(controller.state());
        if let Some(response) = out.response {
            return Run {
                response,
                cycles: cycle,
                states,
            };
        }
    }
    panic!("controller never responded to {:?}", request);
}

fn distinct(states: &[ControllerState]) -> Vec<ControllerState> {
    let mut states = states.to_vec();
    states.dedup();
    states
}

#[test]
fn test_initial_state() {
    let (controller, _) = setup(2);
    assert_eq!(controller.state(), ControllerState::Idle);
    assert!(controller.is_ready());
    assert!(controller.pending_request().is_none());
    assert_eq!(controller.store().valid_lines(), 0);
}

#[test]
fn test_idle_without_request_stays_idle() {
    let (mut controller, mut memory) = setup(2);
    for _ in 0..5 {
        let out = controller.tick(None, &mut memory);
        assert!(out.ready);
        assert!(out.response.is_none());
    }
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.stats().requests, 0);
    assert_eq!(controller.stats().busy_cycles, 0);
    assert_eq!(controller.stats().cycles, 5);
}

#[test]
fn test_clean_miss_state_sequence() {
    let (mut controller, mut memory) = setup(2);
    let run = run(&mut controller, &mut memory, CpuRequest::read(0x100));

    assert_eq!(
        distinct(&run.states),
        vec![
            ControllerState::Compare,
            ControllerState::MissCheck,
            ControllerState::AllocateInit,
            ControllerState::Allocate,
            ControllerState::Update,
            ControllerState::Resp,
            ControllerState::Idle,
        ]
    );
    assert_eq!(run.cycles, 6 + LATENCY as u64);
    assert_eq!(
        run.response,
        CpuResponse {
            data: Some(0x100),
            hit: false
        }
    );
    assert_eq!(memory.accepted, vec![BlockRequest::Read { address: 0x100 }]);
}

#[test]
fn test_hit_state_sequence() {
    let (mut controller, mut memory) = setup(2);
    run(&mut controller, &mut memory, CpuRequest::read(0x100));

    let run = run(&mut controller, &mut memory, CpuRequest::read(0x10C));
    assert_eq!(
        run.states,
        vec![
            ControllerState::Compare,
            ControllerState::Hit,
            ControllerState::Resp,
            ControllerState::Idle,
        ]
    );
    assert_eq!(run.cycles, 4);
    assert_eq!(
        run.response,
        CpuResponse {
            data: Some(0x10C),
            hit: true
        }
    );
    // The hit never touched memory
    assert_eq!(memory.accepted.len(), 1);
}

#[test]
fn test_dirty_miss_writes_back_before_allocating() {
    let (mut controller, mut memory) = setup(1);
    let span = set_span(&controller);

    run(&mut controller, &mut memory, CpuRequest::write(0x200, 0xDEADBEEF));
    let run = run(&mut controller, &mut memory, CpuRequest::read(0x200 + span));

    assert_eq!(
        distinct(&run.states),
        vec![
            ControllerState::Compare,
            ControllerState::MissCheck,
            ControllerState::WritebackInit,
            ControllerState::Writeback,
            ControllerState::AllocateInit,
            ControllerState::Allocate,
            ControllerState::Update,
            ControllerState::Resp,
            ControllerState::Idle,
        ]
    );
    assert_eq!(run.cycles, 7 + 2 * LATENCY as u64);

    // Fill of 0x200, then writeback of 0x200, then fill of the conflicting block
    assert_eq!(memory.accepted.len(), 3);
    assert_eq!(memory.accepted[0], BlockRequest::Read { address: 0x200 });
    match &memory.accepted[1] {
        BlockRequest::Write { address, data } => {
            assert_eq!(*address, 0x200);
            assert_eq!(&data[0..4], &0xDEADBEEFu32.to_le_bytes());
            assert_eq!(&data[4..8], &0x204u32.to_le_bytes());
        }
        other => panic!("expected writeback, got {:?}", other),
    }
    assert_eq!(
        memory.accepted[2],
        BlockRequest::Read {
            address: 0x200 + span
        }
    );

    assert_eq!(memory.inner.peek_word(0x200), 0xDEADBEEF);
    assert_eq!(controller.stats().writebacks, 1);
    assert_eq!(controller.store().dirty_lines(), 0);
}

#[test]
fn test_clean_victim_is_not_written_back() {
    let (mut controller, mut memory) = setup(1);
    let span = set_span(&controller);

    run(&mut controller, &mut memory, CpuRequest::read(0x300));
    run(&mut controller, &mut memory, CpuRequest::read(0x300 + span));

    assert!(memory.accepted.iter().all(|r| !r.is_write()));
    assert_eq!(controller.stats().writebacks, 0);
}

#[test]
fn test_ready_low_and_input_ignored_while_busy() {
    let (mut controller, mut memory) = setup(2);

    let out = controller.tick(Some(CpuRequest::read(0x40)), &mut memory);
    memory.inner.tick();
    assert!(!out.ready);

    // Requests offered while busy are not latched
    let mut response = None;
    for _ in 0..100 {
        let out = controller.tick(Some(CpuRequest::write(0x80, 1)), &mut memory);
        memory.inner.tick();
        if out.response.is_some() {
            assert!(out.ready);
            response = out.response;
            break;
        }
        assert!(!out.ready);
        assert_eq!(controller.pending_request().map(|r| r.address), Some(0x40));
    }

    assert_eq!(response.and_then(|r| r.data), Some(0x40));
    assert_eq!(controller.stats().requests, 1);
    assert_eq!(controller.stats().writes, 0);
}

#[test]
fn test_write_response_has_no_data() {
    let (mut controller, mut memory) = setup(2);

    let miss = run(&mut controller, &mut memory, CpuRequest::write(0x500, 7));
    assert_eq!(miss.response, CpuResponse { data: None, hit: false });

    let hit = run(&mut controller, &mut memory, CpuRequest::write(0x504, 8));
    assert_eq!(hit.response, CpuResponse { data: None, hit: true });
}

#[test]
fn test_write_hit_marks_dirty_without_memory_traffic() {
    let (mut controller, mut memory) = setup(2);
    run(&mut controller, &mut memory, CpuRequest::read(0x600));
    let before = memory.accepted.len();

    run(&mut controller, &mut memory, CpuRequest::write(0x608, 0x12345678));

    assert_eq!(memory.accepted.len(), before);
    assert_eq!(memory.inner.peek_word(0x608), 0x608);
    assert_eq!(controller.store().dirty_lines(), 1);

    let read = run(&mut controller, &mut memory, CpuRequest::read(0x608));
    assert_eq!(read.response.data, Some(0x12345678));
    assert!(read.response.hit);
}

#[test]
fn test_write_miss_merges_into_fetched_block() {
    let (mut controller, mut memory) = setup(2);

    run(
        &mut controller,
        &mut memory,
        CpuRequest::write_masked(0x704, 0xAABBCCDD, ByteMask::BYTE1),
    );

    let index = controller.geometry().decode(0x700).index;
    let way = controller
        .store()
        .probe(index, controller.geometry().decode(0x700).tag)
        .unwrap();
    let line = controller.store().line(index, way);

    assert!(line.is_dirty());
    assert_eq!(&line.data()[0..4], &0x700u32.to_le_bytes());
    assert_eq!(&line.data()[4..8], &0x0000CC04u32.to_le_bytes());
    assert_eq!(&line.data()[8..12], &0x708u32.to_le_bytes());
}

#[test]
fn test_two_way_evicts_least_recently_used() {
    let (mut controller, mut memory) = setup(2);
    let span = set_span(&controller);
    let a = 0x040;
    let b = a + span;
    let c = a + 2 * span;

    assert!(!run(&mut controller, &mut memory, CpuRequest::read(a)).response.hit);
    assert!(!run(&mut controller, &mut memory, CpuRequest::read(b)).response.hit);
    assert!(run(&mut controller, &mut memory, CpuRequest::read(a)).response.hit);

    // B is LRU now; C replaces it
    assert!(!run(&mut controller, &mut memory, CpuRequest::read(c)).response.hit);
    assert!(run(&mut controller, &mut memory, CpuRequest::read(a)).response.hit);
    assert!(!run(&mut controller, &mut memory, CpuRequest::read(b)).response.hit);
}

#[test]
fn test_four_way_uses_recency_order() {
    let (mut controller, mut memory) = setup(4);
    let span = set_span(&controller);
    let blocks: Vec<u32> = (0..5).map(|i| 0x20 + i * span).collect();

    for &addr in &blocks[0..4] {
        assert!(!run(&mut controller, &mut memory, CpuRequest::read(addr)).response.hit);
    }
    // Refresh block 0 so block 1 becomes LRU
    assert!(run(&mut controller, &mut memory, CpuRequest::read(blocks[0])).response.hit);
    assert!(!run(&mut controller, &mut memory, CpuRequest::read(blocks[4])).response.hit);

    for &addr in [blocks[0], blocks[2], blocks[3], blocks[4]].iter() {
        assert!(run(&mut controller, &mut memory, CpuRequest::read(addr)).response.hit);
    }
    assert!(!run(&mut controller, &mut memory, CpuRequest::read(blocks[1])).response.hit);
}

#[test]
fn test_stats_counts() {
    let (mut controller, mut memory) = setup(1);
    let span = set_span(&controller);

    run(&mut controller, &mut memory, CpuRequest::read(0x10));
    run(&mut controller, &mut memory, CpuRequest::write(0x14, 1));
    run(&mut controller, &mut memory, CpuRequest::read(0x10 + span));

    let stats = controller.stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.reads, 2);
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.fills, 2);
    assert_eq!(stats.writebacks, 1);
    assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    // The accepting cycle is spent in IDLE
    assert_eq!(stats.busy_cycles + stats.requests, stats.cycles);
}

#[test]
fn test_reset_invalidates_and_zeroes_stats() {
    let (mut controller, mut memory) = setup(2);
    run(&mut controller, &mut memory, CpuRequest::write(0x100, 5));

    controller.reset();

    assert_eq!(controller.state(), ControllerState::Idle);
    assert!(controller.is_ready());
    assert_eq!(controller.store().valid_lines(), 0);
    assert_eq!(controller.stats().requests, 0);
    assert!(!run(&mut controller, &mut memory, CpuRequest::read(0x100)).response.hit);
}

#[test]
fn test_reset_mid_transaction_returns_to_idle() {
    let (mut controller, mut memory) = setup(2);
    controller.tick(Some(CpuRequest::read(0x100)), &mut memory);
    controller.tick(None, &mut memory);
    assert!(!controller.is_idle());

    controller.reset();
    assert!(controller.is_idle());
    assert!(controller.pending_request().is_none());
}

#[test]
fn test_store_invariants_hold_after_conflicts() {
    let (mut controller, mut memory) = setup(2);
    let span = set_span(&controller);

    for i in 0..20u32 {
        let addr = 0x80 + (i % 3) * span + (i % 4) * 4;
        let request = if i % 2 == 0 {
            CpuRequest::write(addr, i)
        } else {
            CpuRequest::read(addr)
        };
        run(&mut controller, &mut memory, request);
        assert!(controller.store().check_invariants().is_empty());
    }
}
