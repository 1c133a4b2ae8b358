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

//! Address decoding for the cache controller
//!
//! Splits a byte address into the fields used to locate a block in the cache.
//!
//! ```text
//! Address format (address_width bits):
//! [W-1 : O+I]  Tag          - Identifies which block occupies a line
//! [O+I-1 : O]  Set index    - Selects one set (I = log2(sets))
//! [O-1 : 2]    Word offset  - Selects a 32-bit word inside the block
//! [1 : 0]      Byte select  - Selects a byte inside the word
//! ```
//!
//! The tag width is whatever remains of the address once index and offset bits
//! are taken, so a victim's writeback address can always be rebuilt from
//! `{tag, index, 0}`. That relationship is checked once, when a [`Geometry`]
//! is built, and never at runtime.

use crate::core::error::{CacheError, Result};
use serde::{Deserialize, Serialize};

/// Bytes per word (the requester-facing data width)
pub const WORD_BYTES: usize = 4;

/// Shift from a byte offset to a word offset
const WORD_SHIFT: u32 = 2;

/// Widest address the simulator accepts (the backing store holds 2^width bytes)
pub const MAX_ADDRESS_WIDTH: u32 = 24;

/// Fields of a decoded address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAddress {
    /// Tag bits (upper address bits)
    pub tag: u32,
    /// Set index
    pub index: usize,
    /// Byte offset inside the block
    pub block_offset: usize,
    /// Word offset inside the block (block_offset / 4)
    pub word_offset: usize,
}

/// Cache geometry derived from the static configuration
///
/// Fixed for the lifetime of a cache; the cache is never resized.
///
/// # Example
///
/// ```
/// use cachectl::core::cache::Geometry;
///
/// // 16-bit addresses, 16-byte blocks, 32 sets, 2 ways
/// let geometry = Geometry::new(16, 16, 32, 2).unwrap();
/// let decoded = geometry.decode(0x1234);
///
/// assert_eq!(decoded.block_offset, 0x4);
/// assert_eq!(decoded.word_offset, 1);
/// assert_eq!(decoded.index, 0x03);
/// assert_eq!(decoded.tag, 0x09);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    address_width: u32,
    offset_bits: u32,
    index_bits: u32,
    associativity: usize,
}

impl Geometry {
    /// Build a geometry, validating the widths
    ///
    /// # Arguments
    ///
    /// * `address_width` - Address width in bits (1..=24)
    /// * `block_size` - Block size in bytes (power of two, at least one word)
    /// * `sets` - Number of sets (power of two)
    /// * `associativity` - Ways per set (power of two)
    ///
    /// # Returns
    ///
    /// - `Ok(Geometry)` if the tag field is at least one bit wide and the
    ///   cache fits in the address space
    /// - `Err(CacheError::InvalidConfig)` otherwise
    pub fn new(
        address_width: u32,
        block_size: usize,
        sets: usize,
        associativity: usize,
    ) -> Result<Self> {
        if address_width == 0 || address_width > MAX_ADDRESS_WIDTH {
            return Err(CacheError::InvalidConfig {
                field: "cache.address_width",
                reason: format!("{} is outside 1..={}", address_width, MAX_ADDRESS_WIDTH),
            });
        }
        if !block_size.is_power_of_two() || block_size < WORD_BYTES {
            return Err(CacheError::InvalidConfig {
                field: "cache.block_size",
                reason: format!(
                    "{} must be a power of two of at least {} bytes",
                    block_size, WORD_BYTES
                ),
            });
        }
        if !sets.is_power_of_two() {
            return Err(CacheError::InvalidConfig {
                field: "cache.capacity",
                reason: format!("derived set count {} is not a power of two", sets),
            });
        }
        if !associativity.is_power_of_two() {
            return Err(CacheError::InvalidConfig {
                field: "cache.associativity",
                reason: format!("{} must be a power of two", associativity),
            });
        }

        let memory_size = 1usize << address_width;
        let capacity = sets
            .checked_mul(block_size)
            .and_then(|bytes| bytes.checked_mul(associativity));
        if capacity.map_or(true, |capacity| capacity > memory_size) {
            return Err(CacheError::InvalidConfig {
                field: "cache.capacity",
                reason: format!(
                    "{} sets x {} ways x {} bytes exceeds the {}-byte address space",
                    sets, associativity, block_size, memory_size
                ),
            });
        }

        let offset_bits = block_size.trailing_zeros();
        let index_bits = sets.trailing_zeros();

        // Tag must complement index + offset for writeback address reconstruction
        if offset_bits + index_bits >= address_width {
            return Err(CacheError::InvalidConfig {
                field: "cache.address_width",
                reason: format!(
                    "{} bits leave no tag after {} index and {} offset bits",
                    address_width, index_bits, offset_bits
                ),
            });
        }

        Ok(Self {
            address_width,
            offset_bits,
            index_bits,
            associativity,
        })
    }

    /// Address width in bits
    pub fn address_width(&self) -> u32 {
        self.address_width
    }

    /// Block size in bytes
    pub fn block_size(&self) -> usize {
        1 << self.offset_bits
    }

    /// Words per block
    pub fn words_per_block(&self) -> usize {
        self.block_size() / WORD_BYTES
    }

    /// Number of sets
    pub fn sets(&self) -> usize {
        1 << self.index_bits
    }

    /// Ways per set
    pub fn associativity(&self) -> usize {
        self.associativity
    }

    /// Total data capacity in bytes
    pub fn capacity(&self) -> usize {
        self.block_size() * self.sets() * self.associativity
    }

    /// Offset field width
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    /// Index field width
    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    /// Tag field width
    pub fn tag_bits(&self) -> u32 {
        self.address_width - self.offset_bits - self.index_bits
    }

    /// Size of the addressable space in bytes
    pub fn memory_size(&self) -> usize {
        1 << self.address_width
    }

    /// Mask selecting the implemented address bits
    #[inline(always)]
    pub fn address_mask(&self) -> u32 {
        (1u32 << self.address_width) - 1
    }

    /// Decode an address into tag, index, and offsets
    ///
    /// Bits above the address width are ignored, so every `u32` is legal.
    #[inline(always)]
    pub fn decode(&self, addr: u32) -> DecodedAddress {
        let addr = addr & self.address_mask();
        let block_offset = (addr & ((1u32 << self.offset_bits) - 1)) as usize;
        let index = ((addr >> self.offset_bits) & ((1u32 << self.index_bits) - 1)) as usize;
        let tag = addr >> (self.offset_bits + self.index_bits);

        DecodedAddress {
            tag,
            index,
            block_offset,
            word_offset: block_offset >> WORD_SHIFT,
        }
    }

    /// Block-aligned form of an address
    #[inline(always)]
    pub fn block_base(&self, addr: u32) -> u32 {
        (addr & self.address_mask()) & !((1u32 << self.offset_bits) - 1)
    }

    /// Rebuild a block address from a stored tag and its set index
    ///
    /// Used to address the writeback of a dirty victim (offset is always 0).
    #[inline(always)]
    pub fn reconstruct(&self, tag: u32, index: usize) -> u32 {
        (tag << (self.offset_bits + self.index_bits)) | ((index as u32) << self.offset_bits)
    }
}
