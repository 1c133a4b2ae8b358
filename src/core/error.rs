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

//! Error types for the cache simulator
//!
//! The controller state machine itself has no error states: every address is
//! legal and every transition is total. Errors only arise in the layers around
//! it (configuration, trace files, snapshots, and the watchdog that guards a
//! blocking access).

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, CacheError>;

/// Simulator error
#[derive(Debug, Error)]
pub enum CacheError {
    /// Configuration rejected by validation
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// Offending configuration key
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Malformed line in an access trace
    #[error("Trace line {line}: {message}")]
    TraceParse {
        /// 1-based line number
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// A request did not complete within the watchdog limit
    #[error("Watchdog expired after {cycles} cycles waiting for address 0x{address:08X}")]
    Watchdog {
        /// Cycles spent waiting
        cycles: u64,
        /// Address of the stalled request
        address: u32,
    },

    /// Snapshot requested while a transaction is in flight
    #[error("Cannot snapshot while the controller is busy (state {state})")]
    SnapshotBusy {
        /// Controller state at the time of the request
        state: String,
    },

    /// Snapshot does not describe a usable system
    #[error("Invalid snapshot: {0}")]
    SnapshotInvalid(String),

    /// Snapshot encoding failed
    #[error("Snapshot encode error: {0}")]
    SnapshotEncode(#[from] bincode::error::EncodeError),

    /// Snapshot decoding failed
    #[error("Snapshot decode error: {0}")]
    SnapshotDecode(#[from] bincode::error::DecodeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
