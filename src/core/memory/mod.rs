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

//! Latency-modeled backing store
//!
//! The backing store is block addressable: every transfer moves exactly one
//! cache block to or from a block-aligned address. It accepts one transaction
//! at a time and completes it a fixed number of cycles later.
//!
//! # Handshake
//!
//! ```text
//! cycle t      : ready() == true, request(..) accepted
//! cycle t..t+L : ready() == false, tick() counts down
//! cycle t+L-1  : last tick completes the transaction, response latched
//! cycle t+L    : take_response() returns the block (reads) or a write ack
//! ```
//!
//! # Example
//!
//! ```
//! use cachectl::core::config::InitPattern;
//! use cachectl::core::memory::{BackingStore, BlockMemory, BlockRequest, BlockResponse};
//!
//! let mut mem = BackingStore::new(0x1000, 16, 2, InitPattern::Address);
//!
//! assert!(mem.request(BlockRequest::Read { address: 0x100 }));
//! assert!(!mem.ready());
//!
//! mem.tick();
//! assert_eq!(mem.take_response(), None);
//! mem.tick();
//!
//! match mem.take_response() {
//!     Some(BlockResponse::ReadComplete { address, data }) => {
//!         assert_eq!(address, 0x100);
//!         assert_eq!(&data[0..4], &0x100u32.to_le_bytes());
//!     }
//!     other => panic!("unexpected response {:?}", other),
//! }
//! assert!(mem.ready());
//! ```

use crate::core::cache::WORD_BYTES;
use crate::core::config::InitPattern;
use serde::{Deserialize, Serialize};

/// Block transaction issued by the cache controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRequest {
    /// Fetch the block at a block-aligned address
    Read {
        /// Block-aligned byte address
        address: u32,
    },
    /// Replace the block at a block-aligned address
    Write {
        /// Block-aligned byte address
        address: u32,
        /// Full block contents
        data: Vec<u8>,
    },
}

impl BlockRequest {
    /// Target address of the transaction
    pub fn address(&self) -> u32 {
        match self {
            Self::Read { address } | Self::Write { address, .. } => *address,
        }
    }

    /// Whether this is a block write
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// Completion of a block transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockResponse {
    /// Read finished; carries the block
    ReadComplete {
        /// Block-aligned byte address
        address: u32,
        /// Block contents
        data: Vec<u8>,
    },
    /// Write finished; the block has been replaced
    WriteComplete {
        /// Block-aligned byte address
        address: u32,
    },
}

/// Backing-store side of the controller
///
/// The controller only ever talks to memory through this handshake, which
/// keeps it testable against scripted or recording memories.
pub trait BlockMemory {
    /// Whether a new transaction can be accepted this cycle
    fn ready(&self) -> bool;

    /// Offer a transaction
    ///
    /// # Returns
    ///
    /// `true` if the transaction was accepted, `false` if the memory was busy
    fn request(&mut self, request: BlockRequest) -> bool;

    /// Collect the completion of the outstanding transaction, if it finished
    fn take_response(&mut self) -> Option<BlockResponse>;
}

#[derive(Debug, Clone)]
struct InFlight {
    request: BlockRequest,
    remaining: u32,
}

/// Flat word array with a fixed-latency block interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackingStore {
    /// Memory contents, one entry per 32-bit word
    words: Vec<u32>,

    /// Transfer unit in bytes
    block_size: usize,

    /// Cycles between acceptance and completion (at least 1)
    latency: u32,

    /// Pattern used at initialization and reset
    init: InitPattern,

    /// Outstanding transaction (snapshots are only taken while idle)
    #[serde(skip)]
    in_flight: Option<InFlight>,

    /// Completed transaction waiting to be collected
    #[serde(skip)]
    response: Option<BlockResponse>,

    /// Completed block reads
    reads: u64,

    /// Completed block writes
    writes: u64,
}

impl BackingStore {
    /// Create a backing store
    ///
    /// # Arguments
    ///
    /// * `size` - Capacity in bytes (a multiple of `block_size`)
    /// * `block_size` - Transfer unit in bytes
    /// * `latency` - Cycles per transaction (values below 1 are raised to 1)
    /// * `init` - Initial contents
    pub fn new(size: usize, block_size: usize, latency: u32, init: InitPattern) -> Self {
        debug_assert!(size % block_size == 0);
        debug_assert!(block_size % WORD_BYTES == 0);

        Self {
            words: Self::pattern(size / WORD_BYTES, init),
            block_size,
            latency: latency.max(1),
            init,
            in_flight: None,
            response: None,
            reads: 0,
            writes: 0,
        }
    }

    fn pattern(word_count: usize, init: InitPattern) -> Vec<u32> {
        match init {
            InitPattern::Address => (0..word_count)
                .map(|i| (i * WORD_BYTES) as u32)
                .collect(),
            InitPattern::Zero => vec![0; word_count],
        }
    }

    /// Capacity in bytes
    pub fn size(&self) -> usize {
        self.words.len() * WORD_BYTES
    }

    /// Transfer unit in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Cycles per transaction
    pub fn latency(&self) -> u32 {
        self.latency
    }

    /// Completed block reads since reset
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Completed block writes since reset
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Whether a transaction is in flight or awaiting collection
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.response.is_some()
    }

    /// Raw word contents
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline(always)]
    fn word_index(&self, address: u32) -> usize {
        (address as usize % self.size()) / WORD_BYTES
    }

    /// Advance one cycle
    pub fn tick(&mut self) {
        let Some(flight) = self.in_flight.as_mut() else {
            return;
        };

        flight.remaining = flight.remaining.saturating_sub(1);
        if flight.remaining > 0 {
            return;
        }

        if let Some(flight) = self.in_flight.take() {
            self.response = Some(self.complete(flight.request));
        }
    }

    fn complete(&mut self, request: BlockRequest) -> BlockResponse {
        match request {
            BlockRequest::Read { address } => {
                self.reads += 1;
                log::trace!("Memory read complete: 0x{:08X}", address);
                BlockResponse::ReadComplete {
                    address,
                    data: self.peek_block(address),
                }
            }
            BlockRequest::Write { address, data } => {
                self.writes += 1;
                log::trace!("Memory write complete: 0x{:08X}", address);
                let base = self.word_index(address);
                for (i, chunk) in data.chunks_exact(WORD_BYTES).enumerate() {
                    let mut bytes = [0u8; WORD_BYTES];
                    bytes.copy_from_slice(chunk);
                    self.words[base + i] = u32::from_le_bytes(bytes);
                }
                BlockResponse::WriteComplete { address }
            }
        }
    }

    /// Read a whole block immediately, bypassing the handshake
    ///
    /// For verification only; the controller never uses it.
    pub fn peek_block(&self, address: u32) -> Vec<u8> {
        let aligned = address & !((self.block_size as u32) - 1);
        let base = self.word_index(aligned);
        self.words[base..base + self.block_size / WORD_BYTES]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect()
    }

    /// Read one word immediately, bypassing the handshake
    pub fn peek_word(&self, address: u32) -> u32 {
        self.words[self.word_index(address & !0x3)]
    }

    /// Restore the initial pattern and drop any transaction
    pub fn reset(&mut self) {
        self.words = Self::pattern(self.words.len(), self.init);
        self.in_flight = None;
        self.response = None;
        self.reads = 0;
        self.writes = 0;
    }
}

impl BlockMemory for BackingStore {
    fn ready(&self) -> bool {
        !self.is_busy()
    }

    fn request(&mut self, request: BlockRequest) -> bool {
        if self.is_busy() {
            log::warn!(
                "Memory busy, rejected request for 0x{:08X}",
                request.address()
            );
            return false;
        }

        debug_assert_eq!(request.address() % self.block_size as u32, 0);
        if let BlockRequest::Write { data, .. } = &request {
            debug_assert_eq!(data.len(), self.block_size);
        }

        log::trace!(
            "Memory {} accepted: 0x{:08X} ({} cycles)",
            if request.is_write() { "write" } else { "read" },
            request.address(),
            self.latency
        );

        self.in_flight = Some(InFlight {
            request,
            remaining: self.latency,
        });
        true
    }

    fn take_response(&mut self) -> Option<BlockResponse> {
        self.response.take()
    }
}
