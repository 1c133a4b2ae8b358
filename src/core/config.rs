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

//! Simulator configuration
//!
//! Geometry, memory timing, and harness limits are static for the life of a
//! simulation. They are loaded from TOML, validated once, and never changed
//! at runtime.
//!
//! ```toml
//! [cache]
//! address_width = 16
//! capacity = 1024
//! block_size = 16
//! associativity = 2
//!
//! [memory]
//! latency = 4
//! init = "address"
//!
//! [harness]
//! watchdog_cycles = 10000
//! ```

use crate::core::cache::Geometry;
use crate::core::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initial backing-store contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitPattern {
    /// The word at byte address X holds X
    #[default]
    Address,
    /// All zero
    Zero,
}

/// Cache organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Address width in bits
    pub address_width: u32,
    /// Data capacity in bytes
    pub capacity: usize,
    /// Block (line) size in bytes
    pub block_size: usize,
    /// Ways per set (1 = direct-mapped)
    pub associativity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            address_width: 16,
            capacity: 1024,
            block_size: 16,
            associativity: 2,
        }
    }
}

/// Backing-store timing and contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Cycles between accepting a block transaction and completing it
    pub latency: u32,
    /// Initial contents
    pub init: InitPattern,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            latency: 4,
            init: InitPattern::Address,
        }
    }
}

/// Verification driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Cycles a single access may take before the watchdog fires
    pub watchdog_cycles: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            watchdog_cycles: 10_000,
        }
    }
}

/// Complete simulator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Cache organization
    pub cache: CacheConfig,
    /// Backing store
    pub memory: MemoryConfig,
    /// Verification driver
    pub harness: HarnessConfig,
}

impl SimConfig {
    /// Parse configuration from a TOML string (missing keys take defaults)
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate the configuration and derive the cache geometry
    ///
    /// # Returns
    ///
    /// - `Ok(Geometry)` for a consistent configuration
    /// - `Err(CacheError::InvalidConfig)` naming the first offending key
    ///
    /// # Example
    ///
    /// ```
    /// use cachectl::core::config::SimConfig;
    ///
    /// let geometry = SimConfig::default().validate().unwrap();
    /// assert_eq!(geometry.sets(), 32);
    /// assert_eq!(geometry.associativity(), 2);
    /// ```
    pub fn validate(&self) -> Result<Geometry> {
        let cache = &self.cache;

        if cache.associativity == 0 {
            return Err(CacheError::InvalidConfig {
                field: "cache.associativity",
                reason: "must be at least 1".to_string(),
            });
        }
        if cache.block_size == 0 {
            return Err(CacheError::InvalidConfig {
                field: "cache.block_size",
                reason: "must be non-zero".to_string(),
            });
        }

        let set_bytes = cache
            .block_size
            .checked_mul(cache.associativity)
            .ok_or_else(|| CacheError::InvalidConfig {
                field: "cache.associativity",
                reason: format!(
                    "{} ways of {} bytes overflow the set size",
                    cache.associativity, cache.block_size
                ),
            })?;
        if cache.capacity == 0 || cache.capacity % set_bytes != 0 {
            return Err(CacheError::InvalidConfig {
                field: "cache.capacity",
                reason: format!(
                    "{} is not a non-zero multiple of block_size x associativity ({})",
                    cache.capacity, set_bytes
                ),
            });
        }

        let geometry = Geometry::new(
            cache.address_width,
            cache.block_size,
            cache.capacity / set_bytes,
            cache.associativity,
        )?;

        if self.memory.latency == 0 {
            return Err(CacheError::InvalidConfig {
                field: "memory.latency",
                reason: "must be at least 1 cycle".to_string(),
            });
        }
        if self.harness.watchdog_cycles == 0 {
            return Err(CacheError::InvalidConfig {
                field: "harness.watchdog_cycles",
                reason: "must be at least 1 cycle".to_string(),
            });
        }

        Ok(geometry)
    }
}
