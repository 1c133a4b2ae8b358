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

//! Victim selection and recency tracking
//!
//! All associativities go through the same [`VictimSelector`] interface, so a
//! single controller serves both direct-mapped and set-associative caches.
//!
//! | Ways | Selector        | Recency state per set          |
//! |------|-----------------|--------------------------------|
//! | 1    | [`DirectMapped`] | none                          |
//! | 2    | [`LruBit`]       | one bit naming the LRU way    |
//! | N>2  | [`LruStack`]     | way indices, most recent first |

use serde::{Deserialize, Serialize};

/// Replacement policy seam used by the cache store
pub trait VictimSelector {
    /// Way to evict from `set` on a miss
    fn select_victim(&self, set: usize) -> usize;

    /// Mark `way` as most recently used in `set`
    ///
    /// Called on every hit and every install.
    fn touch(&mut self, set: usize, way: usize);

    /// Return every set to its power-on recency order
    fn reset(&mut self);
}

/// Direct-mapped selection: the resident line is always the victim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMapped;

impl VictimSelector for DirectMapped {
    fn select_victim(&self, _set: usize) -> usize {
        0
    }

    fn touch(&mut self, _set: usize, _way: usize) {}

    fn reset(&mut self) {}
}

/// Two-way LRU using a single bit per set
///
/// The bit names the way that is currently least recently used. Touching a
/// way points the bit at the other one. Only correct for exactly two ways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruBit {
    lru_way: Vec<u8>,
}

impl LruBit {
    /// Create LRU bits for `sets` two-way sets (way 0 starts as LRU)
    pub fn new(sets: usize) -> Self {
        Self {
            lru_way: vec![0; sets],
        }
    }
}

impl VictimSelector for LruBit {
    #[inline(always)]
    fn select_victim(&self, set: usize) -> usize {
        self.lru_way[set] as usize
    }

    #[inline(always)]
    fn touch(&mut self, set: usize, way: usize) {
        debug_assert!(way < 2, "LruBit only tracks two ways");
        self.lru_way[set] = (way ^ 1) as u8;
    }

    fn reset(&mut self) {
        self.lru_way.fill(0);
    }
}

/// N-way LRU using an explicit recency order per set
///
/// Each set keeps its way indices ordered from most to least recently used.
/// A touch moves the way to the front; the tail is the eviction candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruStack {
    ways: usize,
    order: Vec<Vec<usize>>,
}

impl LruStack {
    /// Create recency stacks for `sets` sets of `ways` ways
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            ways,
            order: (0..sets).map(|_| Self::initial_order(ways)).collect(),
        }
    }

    // Power-on order puts way 0 at the tail so cold sets fill from way 0 up
    fn initial_order(ways: usize) -> Vec<usize> {
        (0..ways).rev().collect()
    }

    /// Recency order of a set, most recently used first
    pub fn order(&self, set: usize) -> &[usize] {
        &self.order[set]
    }
}

impl VictimSelector for LruStack {
    fn select_victim(&self, set: usize) -> usize {
        self.order[set].last().copied().unwrap_or(0)
    }

    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.order[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            stack.remove(pos);
        }
        stack.insert(0, way);
    }

    fn reset(&mut self) {
        let ways = self.ways;
        for stack in &mut self.order {
            *stack = Self::initial_order(ways);
        }
    }
}

/// Replacement policy chosen from the configured associativity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    /// One way per set
    DirectMapped(DirectMapped),
    /// Two ways per set, single LRU bit
    LruBit(LruBit),
    /// More than two ways per set, full recency order
    LruStack(LruStack),
}

impl ReplacementPolicy {
    /// Pick the policy for a cache of `sets` sets and `ways` ways
    pub fn for_geometry(sets: usize, ways: usize) -> Self {
        match ways {
            0 | 1 => Self::DirectMapped(DirectMapped),
            2 => Self::LruBit(LruBit::new(sets)),
            _ => Self::LruStack(LruStack::new(sets, ways)),
        }
    }

    /// Whether this recency state has the shape of `sets` sets of `ways` ways
    ///
    /// Used to vet state that did not come from [`Self::for_geometry`].
    pub fn fits(&self, sets: usize, ways: usize) -> bool {
        match self {
            Self::DirectMapped(_) => ways == 1,
            Self::LruBit(p) => {
                ways == 2 && p.lru_way.len() == sets && p.lru_way.iter().all(|&w| w < 2)
            }
            Self::LruStack(p) => {
                ways > 2
                    && p.ways == ways
                    && p.order.len() == sets
                    && p.order.iter().all(|stack| {
                        let mut sorted = stack.clone();
                        sorted.sort_unstable();
                        sorted.into_iter().eq(0..ways)
                    })
            }
        }
    }

    /// Short policy name for logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            Self::DirectMapped(_) => "direct-mapped",
            Self::LruBit(_) => "2-way LRU (bit)",
            Self::LruStack(_) => "N-way LRU (stack)",
        }
    }
}

impl VictimSelector for ReplacementPolicy {
    #[inline(always)]
    fn select_victim(&self, set: usize) -> usize {
        match self {
            Self::DirectMapped(p) => p.select_victim(set),
            Self::LruBit(p) => p.select_victim(set),
            Self::LruStack(p) => p.select_victim(set),
        }
    }

    #[inline(always)]
    fn touch(&mut self, set: usize, way: usize) {
        match self {
            Self::DirectMapped(p) => p.touch(set, way),
            Self::LruBit(p) => p.touch(set, way),
            Self::LruStack(p) => p.touch(set, way),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::DirectMapped(p) => p.reset(),
            Self::LruBit(p) => p.reset(),
            Self::LruStack(p) => p.reset(),
        }
    }
}
