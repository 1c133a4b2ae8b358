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

//! Save states
//!
//! A snapshot captures everything needed to resume an idle system: the
//! configuration, every cache line with its recency state, statistics, and
//! the backing-store contents. Snapshots are taken only between transactions,
//! so no in-flight handshake state is recorded.

use super::CacheSystem;
use crate::core::cache::{CacheStore, Controller, Stats};
use crate::core::config::SimConfig;
use crate::core::error::{CacheError, Result};
use crate::core::memory::BackingStore;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Snapshot format version
pub(super) const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    config: SimConfig,
    store: CacheStore,
    stats: Stats,
    memory: BackingStore,
    cycles: u64,
}

impl CacheSystem {
    /// Encode the current state
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<u8>)` with the encoded snapshot
    /// - `Err(CacheError::SnapshotBusy)` if a transaction is in flight
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        if !self.controller.is_idle() || self.memory.is_busy() {
            return Err(CacheError::SnapshotBusy {
                state: self.controller.state().to_string(),
            });
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            store: self.controller.store().clone(),
            stats: self.controller.stats().clone(),
            memory: self.memory.clone(),
            cycles: self.cycles,
        };

        Ok(bincode::serde::encode_to_vec(
            &snapshot,
            bincode::config::standard(),
        )?)
    }

    /// Rebuild a system from an encoded snapshot
    ///
    /// The embedded configuration is re-validated and must agree with the
    /// saved cache shape, recency state, memory size, and memory latency.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _): (Snapshot, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::SnapshotInvalid(format!(
                "unsupported version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let geometry = snapshot.config.validate()?;
        if *snapshot.store.geometry() != geometry {
            return Err(CacheError::SnapshotInvalid(
                "cache geometry does not match configuration".to_string(),
            ));
        }
        if snapshot.memory.size() != geometry.memory_size()
            || snapshot.memory.block_size() != geometry.block_size()
        {
            return Err(CacheError::SnapshotInvalid(
                "backing store size does not match configuration".to_string(),
            ));
        }
        if snapshot.memory.latency() != snapshot.config.memory.latency {
            return Err(CacheError::SnapshotInvalid(format!(
                "backing store latency {} does not match configured latency {}",
                snapshot.memory.latency(),
                snapshot.config.memory.latency
            )));
        }
        if let Some(violation) = snapshot.store.check_invariants().first() {
            return Err(CacheError::SnapshotInvalid(violation.to_string()));
        }

        log::info!(
            "Restored snapshot: {} valid lines, {} dirty",
            snapshot.store.valid_lines(),
            snapshot.store.dirty_lines()
        );

        Ok(Self {
            config: snapshot.config,
            controller: Controller::from_parts(snapshot.store, snapshot.stats),
            memory: snapshot.memory,
            cycles: snapshot.cycles,
        })
    }

    /// Write a snapshot to a file
    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.snapshot()?;
        std::fs::write(path.as_ref(), bytes)?;
        log::info!("State saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Load a system from a snapshot file
    pub fn load_state<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        log::info!("Loading state from {}", path.as_ref().display());
        Self::restore(&bytes)
    }
}
