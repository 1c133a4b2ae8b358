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

//! Randomized equivalence with the reference model

use crate::core::cache::{ByteMask, CpuRequest};
use crate::core::config::SimConfig;
use crate::core::harness::{Access, Driver};
use crate::core::system::CacheSystem;
use proptest::prelude::*;

/// Addresses confined to 4KB so that sets conflict often
fn access_strategy() -> impl Strategy<Value = Access> {
    let address = 0u32..0x1000;
    prop_oneof![
        address.clone().prop_map(Access::read),
        (address, any::<u32>(), 0u8..16).prop_map(|(address, data, bits)| Access {
            request: CpuRequest::write_masked(address, data, ByteMask::from_bits_truncate(bits)),
            expect: None,
        }),
    ]
}

fn trace_strategy() -> impl Strategy<Value = Vec<Access>> {
    prop::collection::vec(access_strategy(), 1..200)
}

fn check(
    associativity: usize,
    block_size: usize,
    accesses: &[Access],
) -> Result<(), TestCaseError> {
    let mut config = SimConfig::default();
    config.cache.associativity = associativity;
    config.cache.block_size = block_size;
    config.memory.latency = 2;

    let mut driver = Driver::new(CacheSystem::new(config).unwrap());
    let report = driver.run(accesses).unwrap();

    prop_assert!(report.is_clean(), "{:?}", report.discrepancies);
    prop_assert!(driver.system().controller().store().check_invariants().is_empty());
    prop_assert_eq!(report.stats.hits + report.stats.misses, accesses.len() as u64);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn direct_mapped_matches_reference(accesses in trace_strategy()) {
        check(1, 16, &accesses)?;
    }

    #[test]
    fn two_way_matches_reference(accesses in trace_strategy()) {
        check(2, 16, &accesses)?;
    }

    #[test]
    fn four_way_matches_reference(accesses in trace_strategy()) {
        check(4, 32, &accesses)?;
    }
}
