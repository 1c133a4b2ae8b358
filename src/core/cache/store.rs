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

//! Cache line storage
//!
//! The store owns every set of the cache, and each set owns exactly
//! `associativity` lines. Recency state lives in the store's
//! [`ReplacementPolicy`], indexed by set.
//!
//! Only the controller mutates the store. The store keeps two invariants:
//! - a set never holds two valid lines with the same tag
//! - an invalid line is never dirty

use super::address::Geometry;
use super::victim::{ReplacementPolicy, VictimSelector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cache line
///
/// Each line stores:
/// - **valid**: whether the line holds a block
/// - **dirty**: whether the block was modified since it was fetched
/// - **tag**: upper address bits of the resident block
/// - **data**: the block itself (`block_size` bytes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLine {
    valid: bool,
    dirty: bool,
    tag: u32,
    data: Vec<u8>,
}

impl CacheLine {
    fn empty(block_size: usize) -> Self {
        Self {
            valid: false,
            dirty: false,
            tag: 0,
            data: vec![0; block_size],
        }
    }

    /// Whether the line holds a block
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the block differs from the backing store's copy
    #[inline(always)]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stored tag (meaningless when the line is invalid)
    #[inline(always)]
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Block data
    #[inline(always)]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.dirty = false;
        self.tag = 0;
        self.data.fill(0);
    }
}

/// One set: `associativity` ways
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSet {
    ways: Vec<CacheLine>,
}

impl CacheSet {
    fn new(associativity: usize, block_size: usize) -> Self {
        Self {
            ways: vec![CacheLine::empty(block_size); associativity],
        }
    }

    /// Lines of this set, in way order
    pub fn ways(&self) -> &[CacheLine] {
        &self.ways
    }
}

/// Broken store invariant found by [`CacheStore::check_invariants`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreViolation {
    /// Two valid ways of one set hold the same tag
    DuplicateTag {
        /// Set index
        index: usize,
        /// Duplicated tag
        tag: u32,
    },
    /// An invalid line is marked dirty
    DirtyInvalid {
        /// Set index
        index: usize,
        /// Way within the set
        way: usize,
    },
    /// The number of sets differs from the geometry
    SetCount {
        /// Sets present
        sets: usize,
    },
    /// A set holds the wrong number of ways
    WayCount {
        /// Set index
        index: usize,
        /// Ways present
        ways: usize,
    },
    /// A line's data is not one block long
    BlockLength {
        /// Set index
        index: usize,
        /// Way within the set
        way: usize,
        /// Bytes present
        len: usize,
    },
    /// Recency state does not match the geometry
    Recency,
}

impl fmt::Display for StoreViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTag { index, tag } => {
                write!(f, "set {} holds tag 0x{:X} in more than one way", index, tag)
            }
            Self::DirtyInvalid { index, way } => {
                write!(f, "set {} way {} is dirty but invalid", index, way)
            }
            Self::SetCount { sets } => write!(f, "store holds {} sets", sets),
            Self::WayCount { index, ways } => write!(f, "set {} holds {} ways", index, ways),
            Self::BlockLength { index, way, len } => {
                write!(f, "set {} way {} holds {} bytes", index, way, len)
            }
            Self::Recency => f.write_str("recency state does not match the geometry"),
        }
    }
}

/// Per-set array of ways plus recency state
///
/// # Example
///
/// ```
/// use cachectl::core::cache::{CacheStore, Geometry};
///
/// let geometry = Geometry::new(16, 16, 32, 2).unwrap();
/// let mut store = CacheStore::new(geometry);
///
/// assert_eq!(store.probe(3, 0x12), None);
///
/// let way = store.select_victim(3);
/// store.install(3, way, 0x12, vec![0xAB; 16], false);
/// store.touch(3, way);
///
/// assert_eq!(store.probe(3, 0x12), Some(way));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStore {
    geometry: Geometry,
    sets: Vec<CacheSet>,
    policy: ReplacementPolicy,
}

impl CacheStore {
    /// Create a store with every line invalid
    pub fn new(geometry: Geometry) -> Self {
        let sets = (0..geometry.sets())
            .map(|_| CacheSet::new(geometry.associativity(), geometry.block_size()))
            .collect();

        Self {
            geometry,
            sets,
            policy: ReplacementPolicy::for_geometry(geometry.sets(), geometry.associativity()),
        }
    }

    /// Geometry this store was built for
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replacement policy in use
    pub fn policy(&self) -> &ReplacementPolicy {
        &self.policy
    }

    /// Look up `tag` in set `index`
    ///
    /// # Returns
    ///
    /// - `Some(way)` if a valid way holds the tag (hit)
    /// - `None` otherwise (miss)
    #[inline]
    pub fn probe(&self, index: usize, tag: u32) -> Option<usize> {
        let ways = &self.sets[index].ways;
        let hit = ways.iter().position(|line| line.valid && line.tag == tag);

        debug_assert!(
            ways.iter().filter(|line| line.valid && line.tag == tag).count() <= 1,
            "set {} holds tag 0x{:X} more than once",
            index,
            tag
        );

        hit
    }

    /// Way to evict from set `index`
    #[inline]
    pub fn select_victim(&self, index: usize) -> usize {
        self.policy.select_victim(index)
    }

    /// Mark `way` as most recently used in set `index`
    #[inline]
    pub fn touch(&mut self, index: usize, way: usize) {
        self.policy.touch(index, way);
    }

    /// Install a block into a way
    ///
    /// Sets the line valid and overwrites tag, data, and dirty state.
    pub fn install(&mut self, index: usize, way: usize, tag: u32, data: Vec<u8>, dirty: bool) {
        debug_assert_eq!(data.len(), self.geometry.block_size());
        debug_assert!(
            self.sets[index]
                .ways
                .iter()
                .enumerate()
                .all(|(w, line)| w == way || !line.valid || line.tag != tag),
            "installing tag 0x{:X} into set {} would duplicate a resident block",
            tag,
            index
        );

        let line = &mut self.sets[index].ways[way];
        line.valid = true;
        line.dirty = dirty;
        line.tag = tag;
        line.data = data;
    }

    /// Replace the data of a resident line without changing its state bits
    pub fn write_data(&mut self, index: usize, way: usize, data: Vec<u8>) {
        let line = &mut self.sets[index].ways[way];
        debug_assert!(line.valid, "writing data into an invalid line");
        debug_assert_eq!(data.len(), line.data.len());
        line.data = data;
    }

    /// Set the dirty bit of a resident line
    pub fn mark_dirty(&mut self, index: usize, way: usize) {
        let line = &mut self.sets[index].ways[way];
        debug_assert!(line.valid, "marking an invalid line dirty");
        line.dirty = true;
    }

    /// Clear the dirty bit after the line's writeback has completed
    pub fn mark_clean(&mut self, index: usize, way: usize) {
        self.sets[index].ways[way].dirty = false;
    }

    /// Line at (`index`, `way`)
    #[inline]
    pub fn line(&self, index: usize, way: usize) -> &CacheLine {
        &self.sets[index].ways[way]
    }

    /// All sets, in index order
    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }

    /// Number of valid lines
    pub fn valid_lines(&self) -> usize {
        self.sets
            .iter()
            .flat_map(|set| set.ways.iter())
            .filter(|line| line.valid)
            .count()
    }

    /// Number of dirty lines
    pub fn dirty_lines(&self) -> usize {
        self.sets
            .iter()
            .flat_map(|set| set.ways.iter())
            .filter(|line| line.dirty)
            .count()
    }

    /// Invalidate every line and reset recency state
    pub fn invalidate_all(&mut self) {
        for line in self.sets.iter_mut().flat_map(|set| set.ways.iter_mut()) {
            line.invalidate();
        }
        self.policy.reset();
    }

    /// Scan every set for broken invariants
    pub fn check_invariants(&self) -> Vec<StoreViolation> {
        let mut violations = Vec::new();
        let geometry = &self.geometry;

        if self.sets.len() != geometry.sets() {
            violations.push(StoreViolation::SetCount {
                sets: self.sets.len(),
            });
        }
        if !self.policy.fits(geometry.sets(), geometry.associativity()) {
            violations.push(StoreViolation::Recency);
        }

        for (index, set) in self.sets.iter().enumerate() {
            if set.ways.len() != geometry.associativity() {
                violations.push(StoreViolation::WayCount {
                    index,
                    ways: set.ways.len(),
                });
            }
            for (way, line) in set.ways.iter().enumerate() {
                if line.data.len() != geometry.block_size() {
                    violations.push(StoreViolation::BlockLength {
                        index,
                        way,
                        len: line.data.len(),
                    });
                }
                if !line.valid && line.dirty {
                    violations.push(StoreViolation::DirtyInvalid { index, way });
                }
                if line.valid
                    && set.ways[way + 1..]
                        .iter()
                        .any(|other| other.valid && other.tag == line.tag)
                {
                    violations.push(StoreViolation::DuplicateTag {
                        index,
                        tag: line.tag,
                    });
                }
            }
        }

        violations
    }
}
