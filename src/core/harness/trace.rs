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

//! Access trace format
//!
//! One access per line:
//!
//! ```text
//! # comment
//! R 0x0100            # read
//! W 0x0200 0xDEADBEEF # full-word write
//! W 0x0204 0x1234 0x3 # write the low half only
//! R 0x0200 hit        # read, expected to hit
//! ```
//!
//! Numbers are hex with a `0x` prefix or decimal. The optional mask is a
//! 4-bit byte-enable value. A trailing `hit` or `miss` records the expected
//! outcome for the verification driver.

use crate::core::cache::{AccessKind, ByteMask, CpuRequest};
use crate::core::error::{CacheError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Request presented to the cache
    pub request: CpuRequest,
    /// Expected hit (`Some(true)`) or miss (`Some(false)`)
    pub expect: Option<bool>,
}

impl Access {
    /// Read with no expectation
    pub fn read(address: u32) -> Self {
        Self {
            request: CpuRequest::read(address),
            expect: None,
        }
    }

    /// Full-word write with no expectation
    pub fn write(address: u32, data: u32) -> Self {
        Self {
            request: CpuRequest::write(address, data),
            expect: None,
        }
    }

    /// Attach an expected outcome
    pub fn expecting(mut self, hit: bool) -> Self {
        self.expect = Some(hit);
        self
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = &self.request;
        match request.kind {
            AccessKind::Read => write!(f, "R 0x{:08X}", request.address)?,
            AccessKind::Write if request.mask == ByteMask::all() => {
                write!(f, "W 0x{:08X} 0x{:08X}", request.address, request.data)?
            }
            AccessKind::Write => write!(
                f,
                "W 0x{:08X} 0x{:08X} 0x{:X}",
                request.address,
                request.data,
                request.mask.bits()
            )?,
        }

        match self.expect {
            Some(true) => write!(f, " hit"),
            Some(false) => write!(f, " miss"),
            None => Ok(()),
        }
    }
}

const USAGE: &str = "'R <addr>' or 'W <addr> <data> [mask]'";

fn parse_number(field: &str) -> std::result::Result<u32, String> {
    let parsed = match field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => field.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", field, e))
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut fields: Vec<&str> = s.split_whitespace().collect();

        let expect = match fields.last().map(|f| f.to_ascii_lowercase()) {
            Some(f) if f == "hit" => Some(true),
            Some(f) if f == "miss" => Some(false),
            _ => None,
        };
        if expect.is_some() {
            fields.pop();
        }

        let request = match fields.as_slice() {
            [op, address] if op.eq_ignore_ascii_case("r") => {
                CpuRequest::read(parse_number(address)?)
            }
            [op, address, data] if op.eq_ignore_ascii_case("w") => {
                CpuRequest::write(parse_number(address)?, parse_number(data)?)
            }
            [op, address, data, mask] if op.eq_ignore_ascii_case("w") => {
                let bits = parse_number(mask)?;
                let mask = u8::try_from(bits)
                    .ok()
                    .and_then(ByteMask::from_bits)
                    .ok_or_else(|| format!("mask '{}' is not a 4-bit byte enable", mask))?;
                CpuRequest::write_masked(parse_number(address)?, parse_number(data)?, mask)
            }
            [] => return Err("empty access".to_string()),
            [op, ..] => {
                return Err(format!(
                    "expected {}, found '{}' with {} operand(s)",
                    USAGE,
                    op,
                    fields.len() - 1
                ))
            }
        };

        Ok(Self { request, expect })
    }
}

/// Parse a whole trace
///
/// Blank lines and `#` comments are skipped.
///
/// # Returns
///
/// - `Ok(Vec<Access>)` in file order
/// - `Err(CacheError::TraceParse)` naming the first bad line (1-based)
pub fn parse_trace(contents: &str) -> Result<Vec<Access>> {
    let mut accesses = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let access = line.parse::<Access>().map_err(|message| CacheError::TraceParse {
            line: number + 1,
            message,
        })?;
        accesses.push(access);
    }

    log::debug!("Parsed {} accesses", accesses.len());
    Ok(accesses)
}

/// Read and parse a trace file
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<Access>> {
    let contents = std::fs::read_to_string(path)?;
    parse_trace(&contents)
}
