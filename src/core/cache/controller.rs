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

//! Cache controller state machine
//!
//! The controller serves one processor request at a time. Each call to
//! [`Controller::tick`] is one cycle and performs the action of the current
//! state:
//!
//! ```text
//!            accept             hit
//!   IDLE ───────────▶ COMPARE ──────▶ HIT ─────────────────────────┐
//!    ▲                   │ miss                                    │
//!    │                   ▼        victim dirty                     ▼
//!    │               MISS_CHECK ─────────────▶ WRITEBACK_INIT     RESP ──▶ IDLE
//!    │                   │ clean/invalid            │ issued       ▲
//!    │                   ▼                          ▼              │
//!    │             ALLOCATE_INIT ◀────────────── WRITEBACK         │
//!    │                   │ issued        done                      │
//!    │                   ▼                                         │
//!    │               ALLOCATE ──────────────────▶ UPDATE ──────────┘
//!    │                         block fetched
//! ```
//!
//! The controller is write-back and write-allocate. A dirty victim is always
//! written back, and its writeback completes, before the replacement block is
//! requested. Ready is low from acceptance until the response cycle, so the
//! requester can never have more than one transaction outstanding.

use super::address::{DecodedAddress, Geometry};
use super::merge::{extract_word, merge_word, ByteMask};
use super::store::CacheStore;
use crate::core::memory::{BlockMemory, BlockRequest, BlockResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a processor request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    /// Load one word
    Read,
    /// Store one word under a byte mask
    Write,
}

/// Processor-side request (request-valid is modeled as `Some(request)`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuRequest {
    /// Read or write
    pub kind: AccessKind,
    /// Byte address
    pub address: u32,
    /// Write data (ignored for reads)
    pub data: u32,
    /// Byte enables for writes (ignored for reads)
    pub mask: ByteMask,
}

impl CpuRequest {
    /// Read of the word containing `address`
    pub fn read(address: u32) -> Self {
        Self {
            kind: AccessKind::Read,
            address,
            data: 0,
            mask: ByteMask::empty(),
        }
    }

    /// Full-word write
    pub fn write(address: u32, data: u32) -> Self {
        Self::write_masked(address, data, ByteMask::all())
    }

    /// Partial-word write
    pub fn write_masked(address: u32, data: u32, mask: ByteMask) -> Self {
        Self {
            kind: AccessKind::Write,
            address,
            data,
            mask,
        }
    }

    /// Whether this request is a write
    pub fn is_write(&self) -> bool {
        self.kind == AccessKind::Write
    }
}

/// Result of a completed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuResponse {
    /// Word read (`None` for writes)
    pub data: Option<u32>,
    /// Whether the request hit in the cache
    pub hit: bool,
}

/// Requester-facing outputs for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortOutput {
    /// Controller can accept a request next cycle
    pub ready: bool,
    /// Response-valid with its payload
    pub response: Option<CpuResponse>,
}

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerState {
    /// Waiting for a request
    #[default]
    Idle,
    /// Probing the indexed set
    Compare,
    /// Serving a hit
    Hit,
    /// Choosing and inspecting the victim
    MissCheck,
    /// Issuing the victim writeback
    WritebackInit,
    /// Waiting for the writeback to complete
    Writeback,
    /// Issuing the block fetch
    AllocateInit,
    /// Waiting for the fetched block
    Allocate,
    /// Installing the fetched block
    Update,
    /// Presenting the response
    Resp,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Compare => "COMPARE",
            Self::Hit => "HIT",
            Self::MissCheck => "MISS_CHECK",
            Self::WritebackInit => "WRITEBACK_INIT",
            Self::Writeback => "WRITEBACK",
            Self::AllocateInit => "ALLOCATE_INIT",
            Self::Allocate => "ALLOCATE",
            Self::Update => "UPDATE",
            Self::Resp => "RESP",
        };
        f.write_str(name)
    }
}

/// Controller statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Requests accepted
    pub requests: u64,
    /// Read requests accepted
    pub reads: u64,
    /// Write requests accepted
    pub writes: u64,
    /// Requests that hit
    pub hits: u64,
    /// Requests that missed
    pub misses: u64,
    /// Dirty victims written back
    pub writebacks: u64,
    /// Blocks fetched and installed
    pub fills: u64,
    /// Cycles spent outside IDLE
    pub busy_cycles: u64,
    /// Cycles ticked
    pub cycles: u64,
}

impl Stats {
    /// Fraction of resolved requests that hit (0.0 when none resolved)
    pub fn hit_rate(&self) -> f64 {
        let resolved = self.hits + self.misses;
        if resolved == 0 {
            0.0
        } else {
            self.hits as f64 / resolved as f64
        }
    }
}

/// Latched in-flight transaction
#[derive(Debug, Clone)]
struct PendingRequest {
    request: CpuRequest,
    decoded: DecodedAddress,
    /// Hit way, or victim way once chosen
    way: usize,
    hit: bool,
    /// Block returned by the allocate read
    fetched: Vec<u8>,
    /// Read result, captured in HIT or UPDATE
    read_data: Option<u32>,
}

/// Write-back, write-allocate cache controller
///
/// # Example
///
/// ```
/// use cachectl::core::cache::{Controller, ControllerState, CpuRequest, Geometry};
/// use cachectl::core::config::InitPattern;
/// use cachectl::core::memory::BackingStore;
///
/// let geometry = Geometry::new(16, 16, 32, 2).unwrap();
/// let mut controller = Controller::new(geometry);
/// let mut memory = BackingStore::new(geometry.memory_size(), 16, 2, InitPattern::Address);
///
/// let mut input = Some(CpuRequest::read(0x100));
/// let response = loop {
///     let out = controller.tick(input.take(), &mut memory);
///     memory.tick();
///     if let Some(response) = out.response {
///         break response;
///     }
/// };
///
/// assert!(!response.hit);
/// assert_eq!(response.data, Some(0x100));
/// assert_eq!(controller.state(), ControllerState::Idle);
/// ```
#[derive(Debug, Clone)]
pub struct Controller {
    store: CacheStore,
    state: ControllerState,
    pending: Option<PendingRequest>,
    ready: bool,
    stats: Stats,
}

impl Controller {
    /// Create a controller with an empty cache
    pub fn new(geometry: Geometry) -> Self {
        Self::from_parts(CacheStore::new(geometry), Stats::default())
    }

    /// Rebuild an idle controller from a saved store and statistics
    pub fn from_parts(store: CacheStore, stats: Stats) -> Self {
        log::debug!(
            "Cache controller: {} sets x {} ways x {} bytes, {}",
            store.geometry().sets(),
            store.geometry().associativity(),
            store.geometry().block_size(),
            store.policy().name()
        );

        Self {
            store,
            state: ControllerState::Idle,
            pending: None,
            ready: true,
            stats,
        }
    }

    /// Current state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether a request would be accepted on the next tick
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether no transaction is in flight
    pub fn is_idle(&self) -> bool {
        self.state == ControllerState::Idle
    }

    /// Statistics since the last reset
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Line storage
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Cache geometry
    pub fn geometry(&self) -> &Geometry {
        self.store.geometry()
    }

    /// Request currently being served
    pub fn pending_request(&self) -> Option<&CpuRequest> {
        self.pending.as_ref().map(|p| &p.request)
    }

    /// Invalidate every line, zero statistics, and return to IDLE
    ///
    /// Any in-flight transaction is dropped.
    pub fn reset(&mut self) {
        self.store.invalidate_all();
        self.state = ControllerState::Idle;
        self.pending = None;
        self.ready = true;
        self.stats = Stats::default();
    }

    /// Advance one cycle
    ///
    /// # Arguments
    ///
    /// * `input` - Request presented this cycle; only latched in IDLE
    /// * `memory` - Backing store handshake
    ///
    /// # Returns
    ///
    /// Ready and response-valid outputs at the end of the cycle
    pub fn tick<M: BlockMemory>(
        &mut self,
        input: Option<CpuRequest>,
        memory: &mut M,
    ) -> PortOutput {
        self.stats.cycles += 1;

        let response = match self.pending.take() {
            None => {
                if let Some(request) = input {
                    self.accept(request);
                }
                None
            }
            Some(mut pending) => {
                self.stats.busy_cycles += 1;
                let (next, response) = self.advance(&mut pending, memory);
                if next != self.state {
                    log::trace!("Cache state: {} -> {}", self.state, next);
                }
                self.state = next;
                if next != ControllerState::Idle {
                    self.pending = Some(pending);
                }
                response
            }
        };

        PortOutput {
            ready: self.ready,
            response,
        }
    }

    fn accept(&mut self, request: CpuRequest) {
        let decoded = self.store.geometry().decode(request.address);

        log::trace!(
            "Cache accept: {:?} 0x{:08X} (tag 0x{:X}, set {}, word {})",
            request.kind,
            request.address,
            decoded.tag,
            decoded.index,
            decoded.word_offset
        );

        self.stats.requests += 1;
        match request.kind {
            AccessKind::Read => self.stats.reads += 1,
            AccessKind::Write => self.stats.writes += 1,
        }

        self.pending = Some(PendingRequest {
            request,
            decoded,
            way: 0,
            hit: false,
            fetched: Vec::new(),
            read_data: None,
        });
        self.ready = false;
        self.state = ControllerState::Compare;
    }

    fn advance<M: BlockMemory>(
        &mut self,
        pending: &mut PendingRequest,
        memory: &mut M,
    ) -> (ControllerState, Option<CpuResponse>) {
        let DecodedAddress {
            tag,
            index,
            word_offset,
            ..
        } = pending.decoded;

        match self.state {
            // A request is only latched on the way out of IDLE
            ControllerState::Idle => (ControllerState::Idle, None),

            ControllerState::Compare => match self.store.probe(index, tag) {
                Some(way) => {
                    pending.way = way;
                    pending.hit = true;
                    self.stats.hits += 1;
                    (ControllerState::Hit, None)
                }
                None => {
                    pending.hit = false;
                    self.stats.misses += 1;
                    (ControllerState::MissCheck, None)
                }
            },

            ControllerState::Hit => {
                let way = pending.way;
                let request = pending.request;
                match request.kind {
                    AccessKind::Read => {
                        let line = self.store.line(index, way);
                        pending.read_data = Some(extract_word(line.data(), word_offset));
                    }
                    AccessKind::Write => {
                        let merged = merge_word(
                            self.store.line(index, way).data(),
                            word_offset,
                            request.data,
                            request.mask,
                        );
                        self.store.write_data(index, way, merged);
                        self.store.mark_dirty(index, way);
                    }
                }
                self.store.touch(index, way);
                (ControllerState::Resp, None)
            }

            ControllerState::MissCheck => {
                let way = self.store.select_victim(index);
                pending.way = way;

                let victim = self.store.line(index, way);
                if victim.is_valid() && victim.is_dirty() {
                    log::debug!(
                        "Cache miss 0x{:08X}: evicting dirty block 0x{:08X} from set {} way {}",
                        pending.request.address,
                        self.store.geometry().reconstruct(victim.tag(), index),
                        index,
                        way
                    );
                    (ControllerState::WritebackInit, None)
                } else {
                    log::debug!(
                        "Cache miss 0x{:08X}: filling set {} way {}",
                        pending.request.address,
                        index,
                        way
                    );
                    (ControllerState::AllocateInit, None)
                }
            }

            ControllerState::WritebackInit => {
                if !memory.ready() {
                    return (ControllerState::WritebackInit, None);
                }
                let victim = self.store.line(index, pending.way);
                let request = BlockRequest::Write {
                    address: self.store.geometry().reconstruct(victim.tag(), index),
                    data: victim.data().to_vec(),
                };
                if memory.request(request) {
                    (ControllerState::Writeback, None)
                } else {
                    (ControllerState::WritebackInit, None)
                }
            }

            ControllerState::Writeback => match memory.take_response() {
                Some(BlockResponse::WriteComplete { .. }) => {
                    // Only a completed writeback may clean a line
                    self.store.mark_clean(index, pending.way);
                    self.stats.writebacks += 1;
                    (ControllerState::AllocateInit, None)
                }
                Some(other) => {
                    log::warn!("Cache ignored unexpected memory response {:?}", other);
                    (ControllerState::Writeback, None)
                }
                None => (ControllerState::Writeback, None),
            },

            ControllerState::AllocateInit => {
                let victim = self.store.line(index, pending.way);
                debug_assert!(
                    !(victim.is_valid() && victim.is_dirty()),
                    "allocating over set {} way {} before its writeback completed",
                    index,
                    pending.way
                );

                if !memory.ready() {
                    return (ControllerState::AllocateInit, None);
                }
                let address = self.store.geometry().block_base(pending.request.address);
                if memory.request(BlockRequest::Read { address }) {
                    (ControllerState::Allocate, None)
                } else {
                    (ControllerState::AllocateInit, None)
                }
            }

            ControllerState::Allocate => match memory.take_response() {
                Some(BlockResponse::ReadComplete { data, .. }) => {
                    pending.fetched = data;
                    (ControllerState::Update, None)
                }
                Some(other) => {
                    log::warn!("Cache ignored unexpected memory response {:?}", other);
                    (ControllerState::Allocate, None)
                }
                None => (ControllerState::Allocate, None),
            },

            ControllerState::Update => {
                let block = std::mem::take(&mut pending.fetched);
                let request = pending.request;
                let (data, dirty) = match request.kind {
                    AccessKind::Read => {
                        pending.read_data = Some(extract_word(&block, word_offset));
                        (block, false)
                    }
                    AccessKind::Write => (
                        merge_word(&block, word_offset, request.data, request.mask),
                        true,
                    ),
                };

                self.store.install(index, pending.way, tag, data, dirty);
                self.store.touch(index, pending.way);
                self.stats.fills += 1;
                (ControllerState::Resp, None)
            }

            ControllerState::Resp => {
                self.ready = true;
                let data = match pending.request.kind {
                    AccessKind::Read => pending.read_data,
                    AccessKind::Write => None,
                };
                (
                    ControllerState::Idle,
                    Some(CpuResponse {
                        data,
                        hit: pending.hit,
                    }),
                )
            }
        }
    }
}
