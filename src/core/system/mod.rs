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

//! System integration module
//!
//! Ties the cache controller to its backing store and provides the cycle loop.
//!
//! Each [`CacheSystem::tick`] advances the controller by one cycle and then the
//! backing store by one cycle. [`CacheSystem::access`] wraps the handshake for
//! a single request and guards it with a watchdog.
//!
//! # Example
//!
//! ```
//! use cachectl::core::config::SimConfig;
//! use cachectl::core::system::CacheSystem;
//!
//! let mut system = CacheSystem::new(SimConfig::default())?;
//!
//! let first = system.read(0x100)?;
//! assert!(!first.hit);
//! assert_eq!(first.data, Some(0x100));
//!
//! let second = system.read(0x104)?;
//! assert!(second.hit);
//! assert_eq!(second.data, Some(0x104));
//! # Ok::<(), cachectl::CacheError>(())
//! ```

mod snapshot;

#[cfg(test)]
mod tests;

use super::cache::{
    extract_word, ByteMask, Controller, CpuRequest, Geometry, PortOutput, Stats,
};
use super::config::SimConfig;
use super::error::{CacheError, Result};
use super::memory::BackingStore;

/// Outcome of one complete access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Whether the access hit
    pub hit: bool,
    /// Word read (`None` for writes)
    pub data: Option<u32>,
    /// Cycles from acceptance to response, inclusive
    pub cycles: u64,
}

/// Cache controller plus backing store
pub struct CacheSystem {
    /// Validated configuration
    config: SimConfig,
    /// Cache controller
    controller: Controller,
    /// Backing store
    memory: BackingStore,
    /// Total cycles ticked
    cycles: u64,
}

impl CacheSystem {
    /// Create a system in its reset state
    ///
    /// # Returns
    ///
    /// - `Ok(CacheSystem)` with all lines invalid and memory initialized
    /// - `Err(CacheError::InvalidConfig)` if the configuration is inconsistent
    pub fn new(config: SimConfig) -> Result<Self> {
        let geometry = config.validate()?;
        let memory = BackingStore::new(
            geometry.memory_size(),
            geometry.block_size(),
            config.memory.latency,
            config.memory.init,
        );

        log::info!(
            "Cache system: {} bytes, {}-way, {}-byte blocks, {}-bit addresses, memory latency {}",
            geometry.capacity(),
            geometry.associativity(),
            geometry.block_size(),
            geometry.address_width(),
            config.memory.latency
        );

        Ok(Self {
            config,
            controller: Controller::new(geometry),
            memory,
            cycles: 0,
        })
    }

    /// Advance one cycle
    ///
    /// # Arguments
    ///
    /// * `input` - Request presented to the controller this cycle
    pub fn tick(&mut self, input: Option<CpuRequest>) -> PortOutput {
        let out = self.controller.tick(input, &mut self.memory);
        self.memory.tick();
        self.cycles += 1;
        out
    }

    /// Run one request to completion
    ///
    /// Waits for the controller to become ready, presents the request, and
    /// ticks until the response arrives.
    ///
    /// # Returns
    ///
    /// - `Ok(Completion)` with hit status, read data, and latency
    /// - `Err(CacheError::Watchdog)` if the watchdog limit is reached
    pub fn access(&mut self, request: CpuRequest) -> Result<Completion> {
        let limit = self.config.harness.watchdog_cycles;

        let mut waited = 0u64;
        while !self.controller.is_ready() {
            self.tick(None);
            waited += 1;
            if waited >= limit {
                return Err(CacheError::Watchdog {
                    cycles: waited,
                    address: request.address,
                });
            }
        }

        let mut input = Some(request);
        let mut cycles = 0u64;
        loop {
            let out = self.tick(input.take());
            cycles += 1;

            if let Some(response) = out.response {
                return Ok(Completion {
                    hit: response.hit,
                    data: response.data,
                    cycles,
                });
            }

            if cycles >= limit {
                log::warn!(
                    "Watchdog: 0x{:08X} unresolved after {} cycles (state {})",
                    request.address,
                    cycles,
                    self.controller.state()
                );
                return Err(CacheError::Watchdog {
                    cycles,
                    address: request.address,
                });
            }
        }
    }

    /// Read the word containing `address`
    pub fn read(&mut self, address: u32) -> Result<Completion> {
        self.access(CpuRequest::read(address))
    }

    /// Write a full word
    pub fn write(&mut self, address: u32, data: u32) -> Result<Completion> {
        self.access(CpuRequest::write(address, data))
    }

    /// Write selected bytes of a word
    pub fn write_masked(&mut self, address: u32, data: u32, mask: ByteMask) -> Result<Completion> {
        self.access(CpuRequest::write_masked(address, data, mask))
    }

    /// Current value of a word as the requester would observe it
    ///
    /// Returns the cached copy when the block is resident, otherwise the
    /// backing store's copy. No cycles elapse and no recency state changes.
    pub fn peek_word(&self, address: u32) -> u32 {
        let geometry = self.controller.geometry();
        let decoded = geometry.decode(address);
        let store = self.controller.store();

        match store.probe(decoded.index, decoded.tag) {
            Some(way) => extract_word(store.line(decoded.index, way).data(), decoded.word_offset),
            None => self.memory.peek_word(address & geometry.address_mask()),
        }
    }

    /// Return controller and memory to their reset state
    pub fn reset(&mut self) {
        self.controller.reset();
        self.memory.reset();
        self.cycles = 0;
        log::info!("Cache system reset");
    }

    /// Cache controller
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Backing store
    pub fn memory(&self) -> &BackingStore {
        &self.memory
    }

    /// Controller statistics
    pub fn stats(&self) -> &Stats {
        self.controller.stats()
    }

    /// Configuration in use
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Cache geometry
    pub fn geometry(&self) -> &Geometry {
        self.controller.geometry()
    }

    /// Cycles ticked since creation or reset
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
