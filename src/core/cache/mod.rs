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

//! Write-back cache: address decoding, line storage, victim selection, and
//! the controller state machine
//!
//! # Components
//!
//! - [`address`]: address → (tag, set index, block offset, word offset)
//! - [`merge`]: byte-masked merge of a word into a block
//! - [`store`]: per-set ways with valid/dirty/tag/data
//! - [`victim`]: direct-mapped and LRU victim selection
//! - [`controller`]: the multi-cycle request state machine
//!
//! One controller serves every associativity; the policy difference lives
//! entirely behind [`VictimSelector`].

pub mod address;
pub mod controller;
pub mod merge;
pub mod store;
pub mod victim;

#[cfg(test)]
mod tests;

pub use address::{DecodedAddress, Geometry, MAX_ADDRESS_WIDTH, WORD_BYTES};
pub use controller::{
    AccessKind, Controller, ControllerState, CpuRequest, CpuResponse, PortOutput, Stats,
};
pub use merge::{extract_word, merge_word, ByteMask};
pub use store::{CacheLine, CacheSet, CacheStore, StoreViolation};
pub use victim::{DirectMapped, LruBit, LruStack, ReplacementPolicy, VictimSelector};
