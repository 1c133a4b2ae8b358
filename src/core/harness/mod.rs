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

//! Verification harness
//!
//! Drives a [`CacheSystem`] with a sequence of accesses and checks every
//! result against a [`ReferenceModel`], a plain word array with no cache in
//! front of it. Mismatches are collected as [`Discrepancy`] values in a
//! [`Report`]; they never alter the controller.
//!
//! # Example
//!
//! ```
//! use cachectl::core::config::SimConfig;
//! use cachectl::core::harness::{parse_trace, Driver};
//! use cachectl::core::system::CacheSystem;
//!
//! let accesses = parse_trace("R 0x100 miss\nR 0x104 hit\nW 0x200 0xDEADBEEF\nR 0x200 hit")?;
//!
//! let mut driver = Driver::new(CacheSystem::new(SimConfig::default())?);
//! let report = driver.run(&accesses)?;
//!
//! assert!(report.is_clean());
//! assert_eq!(report.stats.hits, 2);
//! # Ok::<(), cachectl::CacheError>(())
//! ```

mod trace;

#[cfg(test)]
mod tests;

pub use trace::{load_trace, parse_trace, Access};

use crate::core::cache::{AccessKind, ByteMask, Stats, WORD_BYTES};
use crate::core::config::InitPattern;
use crate::core::error::Result;
use crate::core::system::{CacheSystem, Completion};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Uncached memory with the same contents the backing store starts with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceModel {
    words: Vec<u32>,
}

impl ReferenceModel {
    /// Create a model of `size` bytes filled with `init`
    pub fn new(size: usize, init: InitPattern) -> Self {
        let count = size / WORD_BYTES;
        let words = match init {
            InitPattern::Address => (0..count).map(|i| (i * WORD_BYTES) as u32).collect(),
            InitPattern::Zero => vec![0; count],
        };
        Self { words }
    }

    /// Capture the coherent contents of a running system
    ///
    /// Used when the system was restored from a snapshot and may hold
    /// dirty lines.
    pub fn from_system(system: &CacheSystem) -> Self {
        let size = system.geometry().memory_size();
        let words = (0..size / WORD_BYTES)
            .map(|i| system.peek_word((i * WORD_BYTES) as u32))
            .collect();
        Self { words }
    }

    #[inline(always)]
    fn word_index(&self, address: u32) -> usize {
        (address as usize / WORD_BYTES) % self.words.len()
    }

    /// Read the word containing `address`
    pub fn read(&self, address: u32) -> u32 {
        self.words[self.word_index(address)]
    }

    /// Write the bytes of `data` selected by `mask`
    pub fn write(&mut self, address: u32, data: u32, mask: ByteMask) {
        let index = self.word_index(address);
        let bits = mask.expand();
        self.words[index] = (self.words[index] & !bits) | (data & bits);
    }

    /// Raw word contents
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// A mismatch between the cache and the reference model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// A read returned the wrong word
    Data {
        access: usize,
        address: u32,
        expected: u32,
        actual: u32,
    },
    /// The hit/miss outcome differed from the trace's expectation
    HitMiss {
        access: usize,
        address: u32,
        expected: bool,
        actual: bool,
    },
    /// The coherent view of a word diverged (a lost or corrupted write)
    Coherence {
        address: u32,
        expected: u32,
        actual: u32,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = |hit: bool| if hit { "hit" } else { "miss" };
        match *self {
            Discrepancy::Data {
                access,
                address,
                expected,
                actual,
            } => write!(
                f,
                "access #{}: read 0x{:08X} returned 0x{:08X}, expected 0x{:08X}",
                access, address, actual, expected
            ),
            Discrepancy::HitMiss {
                access,
                address,
                expected,
                actual,
            } => write!(
                f,
                "access #{}: 0x{:08X} was a {}, expected a {}",
                access,
                address,
                outcome(actual),
                outcome(expected)
            ),
            Discrepancy::Coherence {
                address,
                expected,
                actual,
            } => write!(
                f,
                "word 0x{:08X} holds 0x{:08X}, expected 0x{:08X}",
                address, actual, expected
            ),
        }
    }
}

/// Outcome of a verification run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Accesses applied
    pub accesses: usize,
    /// Every mismatch found, in order
    pub discrepancies: Vec<Discrepancy>,
    /// Controller statistics at the end of the run
    pub stats: Stats,
    /// Cycles ticked by the system
    pub cycles: u64,
}

impl Report {
    /// Whether the run found no mismatches
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Applies accesses to a cache system and its reference model in lockstep
pub struct Driver {
    system: CacheSystem,
    reference: ReferenceModel,
    /// Word addresses written or read so far
    touched: BTreeSet<u32>,
    discrepancies: Vec<Discrepancy>,
    accesses: usize,
}

impl Driver {
    /// Wrap a system, seeding the reference model from its coherent contents
    pub fn new(system: CacheSystem) -> Self {
        let fresh = system.stats().requests == 0 && system.memory().writes() == 0;
        let reference = if fresh {
            let init = system.config().memory.init;
            ReferenceModel::new(system.geometry().memory_size(), init)
        } else {
            ReferenceModel::from_system(&system)
        };

        Self {
            system,
            reference,
            touched: BTreeSet::new(),
            discrepancies: Vec::new(),
            accesses: 0,
        }
    }

    /// Apply one access and compare the result
    ///
    /// # Returns
    ///
    /// - `Ok(Completion)` from the cache system, whether or not it matched
    /// - `Err(CacheError::Watchdog)` if the controller stopped responding
    pub fn apply(&mut self, access: &Access) -> Result<Completion> {
        let request = access.request;
        let address = request.address & self.system.geometry().address_mask() & !0x3;
        let number = self.accesses;

        let completion = self.system.access(request)?;
        self.accesses += 1;

        match request.kind {
            AccessKind::Read => {
                let expected = self.reference.read(address);
                let actual = completion.data.unwrap_or_default();
                if completion.data != Some(expected) {
                    self.record(Discrepancy::Data {
                        access: number,
                        address,
                        expected,
                        actual,
                    });
                }
            }
            AccessKind::Write => {
                self.reference.write(address, request.data, request.mask);
            }
        }

        if let Some(expected) = access.expect {
            if completion.hit != expected {
                self.record(Discrepancy::HitMiss {
                    access: number,
                    address,
                    expected,
                    actual: completion.hit,
                });
            }
        }

        self.touched.insert(address);
        self.check_word(address);

        Ok(completion)
    }

    /// Apply a sequence and check every touched word afterwards
    pub fn run(&mut self, accesses: &[Access]) -> Result<Report> {
        for access in accesses {
            self.apply(access)?;
        }
        self.check_coherence();
        Ok(self.report())
    }

    /// Compare the coherent view of every touched word with the model
    pub fn check_coherence(&mut self) {
        let touched: Vec<u32> = self.touched.iter().copied().collect();
        for address in touched {
            self.check_word(address);
        }
    }

    fn check_word(&mut self, address: u32) {
        let expected = self.reference.read(address);
        let actual = self.system.peek_word(address);
        if expected != actual {
            self.record(Discrepancy::Coherence {
                address,
                expected,
                actual,
            });
        }
    }

    fn record(&mut self, discrepancy: Discrepancy) {
        log::warn!("{}", discrepancy);
        if !self.discrepancies.contains(&discrepancy) {
            self.discrepancies.push(discrepancy);
        }
    }

    /// Snapshot of the results so far
    pub fn report(&self) -> Report {
        Report {
            accesses: self.accesses,
            discrepancies: self.discrepancies.clone(),
            stats: self.system.stats().clone(),
            cycles: self.system.cycles(),
        }
    }

    /// System under test
    pub fn system(&self) -> &CacheSystem {
        &self.system
    }

    /// Reference model
    pub fn reference(&self) -> &ReferenceModel {
        &self.reference
    }

    /// Release the system (for saving its state)
    pub fn into_system(self) -> CacheSystem {
        self.system
    }
}
