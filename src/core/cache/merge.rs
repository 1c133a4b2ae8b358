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

//! Sub-word merge of write data into a cache block
//!
//! Words are stored little-endian inside a block. A write carries one word and
//! a per-byte mask; only the bytes selected by the mask are replaced.

use super::address::WORD_BYTES;
use bitflags::bitflags;

bitflags! {
    /// Per-byte write enable for one 32-bit word
    ///
    /// Bit `n` enables byte `n` of the word (byte 0 is the least significant).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ByteMask: u8 {
        /// Byte 0 (bits 7:0)
        const BYTE0 = 1 << 0;
        /// Byte 1 (bits 15:8)
        const BYTE1 = 1 << 1;
        /// Byte 2 (bits 23:16)
        const BYTE2 = 1 << 2;
        /// Byte 3 (bits 31:24)
        const BYTE3 = 1 << 3;
        /// Lower halfword
        const LOW_HALF = Self::BYTE0.bits() | Self::BYTE1.bits();
        /// Upper halfword
        const HIGH_HALF = Self::BYTE2.bits() | Self::BYTE3.bits();
    }
}

impl ByteMask {
    /// Expand the mask to a 32-bit bit mask (0xFF per enabled byte)
    ///
    /// # Example
    ///
    /// ```
    /// use cachectl::core::cache::ByteMask;
    ///
    /// assert_eq!(ByteMask::LOW_HALF.expand(), 0x0000_FFFF);
    /// assert_eq!(ByteMask::all().expand(), 0xFFFF_FFFF);
    /// ```
    pub fn expand(self) -> u32 {
        (0..WORD_BYTES)
            .filter(|&i| self.bits() & (1 << i) != 0)
            .fold(0u32, |acc, i| acc | (0xFF << (i * 8)))
    }
}

impl Default for ByteMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Read the word at `word_offset` from a block
#[inline]
pub fn extract_word(block: &[u8], word_offset: usize) -> u32 {
    let start = word_offset * WORD_BYTES;
    let mut bytes = [0u8; WORD_BYTES];
    bytes.copy_from_slice(&block[start..start + WORD_BYTES]);
    u32::from_le_bytes(bytes)
}

/// Merge a word into a block
///
/// Returns a copy of `block` in which every byte of the word at `word_offset`
/// that is enabled in `mask` is taken from `word`. All other bytes, including
/// every other word of the block, are unchanged.
///
/// # Example
///
/// ```
/// use cachectl::core::cache::{extract_word, merge_word, ByteMask};
///
/// let block = vec![0x11u8; 16];
/// let merged = merge_word(&block, 2, 0xAABBCCDD, ByteMask::BYTE0 | ByteMask::BYTE3);
///
/// assert_eq!(extract_word(&merged, 2), 0xAA1111DD);
/// assert_eq!(extract_word(&merged, 1), 0x11111111);
/// ```
pub fn merge_word(block: &[u8], word_offset: usize, word: u32, mask: ByteMask) -> Vec<u8> {
    let mut merged = block.to_vec();
    let start = word_offset * WORD_BYTES;

    for (i, byte) in word.to_le_bytes().into_iter().enumerate() {
        if mask.bits() & (1 << i) != 0 {
            merged[start + i] = byte;
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_block() -> Vec<u8> {
        (0u8..16).collect()
    }

    #[test]
    fn test_extract_word_little_endian() {
        let block = pattern_block();
        assert_eq!(extract_word(&block, 0), 0x03020100);
        assert_eq!(extract_word(&block, 3), 0x0F0E0D0C);
    }

    #[test]
    fn test_merge_full_mask_replaces_word() {
        let block = pattern_block();
        let merged = merge_word(&block, 1, 0xDEADBEEF, ByteMask::all());

        assert_eq!(extract_word(&merged, 1), 0xDEADBEEF);
        assert_eq!(extract_word(&merged, 0), 0x03020100);
        assert_eq!(extract_word(&merged, 2), 0x0B0A0908);
        assert_eq!(extract_word(&merged, 3), 0x0F0E0D0C);
    }

    #[test]
    fn test_merge_partial_mask() {
        let block = pattern_block();

        let merged = merge_word(&block, 0, 0xDEADBEEF, ByteMask::LOW_HALF);
        assert_eq!(extract_word(&merged, 0), 0x0302BEEF);

        let merged = merge_word(&block, 0, 0xDEADBEEF, ByteMask::BYTE2);
        assert_eq!(extract_word(&merged, 0), 0x03AD0100);
    }

    #[test]
    fn test_merge_empty_mask_is_identity() {
        let block = pattern_block();
        let merged = merge_word(&block, 2, 0xFFFFFFFF, ByteMask::empty());
        assert_eq!(merged, block);
    }

    #[test]
    fn test_merge_leaves_input_untouched() {
        let block = pattern_block();
        let _ = merge_word(&block, 0, 0xFFFFFFFF, ByteMask::all());
        assert_eq!(block, pattern_block());
    }

    #[test]
    fn test_expand_mask() {
        assert_eq!(ByteMask::empty().expand(), 0);
        assert_eq!(ByteMask::BYTE1.expand(), 0x0000_FF00);
        assert_eq!(ByteMask::HIGH_HALF.expand(), 0xFFFF_0000);
        assert_eq!((ByteMask::BYTE0 | ByteMask::BYTE3).expand(), 0xFF00_00FF);
    }

    #[test]
    fn test_default_mask_is_full_word() {
        assert_eq!(ByteMask::default(), ByteMask::all());
    }
}
