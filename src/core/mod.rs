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

//! Core simulation components
//!
//! - [`cache`]: Address decoding, line storage, victim selection, and the
//!   controller state machine
//! - [`memory`]: Latency-modeled backing store
//! - [`system`]: Controller and backing store wired into one cycle loop
//! - [`harness`]: Reference model, verification driver, and trace format
//! - [`config`]: TOML configuration
//! - [`error`]: Error types

pub mod cache;
pub mod config;
pub mod error;
pub mod harness;
pub mod memory;
pub mod system;
