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

//! cachectl: a cycle-stepped write-back cache controller
//!
//! This crate models a single-requester cache sitting between a processor
//! port and a slow backing store. The controller is a multi-cycle state
//! machine that decodes addresses, detects hits, writes back dirty victims,
//! allocates blocks on every miss (reads and writes alike), and merges
//! sub-word writes. Direct-mapped and set-associative organizations share
//! one controller, differing only in their victim selection policy.
//!
//! # Architecture
//!
//! - [`core::cache`]: Controller state machine and its building blocks
//! - [`core::memory`]: Backing store behind a request/response handshake
//! - [`core::system`]: Cycle loop, access helper, and save states
//! - [`core::harness`]: Reference-model verification and access traces
//! - [`core::config`]: Geometry and timing configuration
//!
//! # Example
//!
//! ```
//! use cachectl::core::config::SimConfig;
//! use cachectl::core::system::CacheSystem;
//!
//! let mut system = CacheSystem::new(SimConfig::default())?;
//!
//! system.write(0x200, 0xDEADBEEF)?;
//! let read = system.read(0x200)?;
//!
//! assert!(read.hit);
//! assert_eq!(read.data, Some(0xDEADBEEF));
//! # Ok::<(), cachectl::CacheError>(())
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, CacheError>`. The controller itself never fails; errors come from
//! configuration, traces, snapshots, I/O, and the watchdog.

pub mod core;

// Re-export commonly used types
pub use core::error::{CacheError, Result};
