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

//! Driver and reference model tests

use crate::core::cache::{ByteMask, CpuRequest};
use crate::core::config::{InitPattern, SimConfig};
use crate::core::harness::{parse_trace, Access, Discrepancy, Driver, ReferenceModel};
use crate::core::system::CacheSystem;

fn driver() -> Driver {
    Driver::new(CacheSystem::new(SimConfig::default()).unwrap())
}

#[test]
fn test_reference_model_masked_write() {
    let mut model = ReferenceModel::new(0x1000, InitPattern::Address);
    assert_eq!(model.read(0x40), 0x40);

    model.write(0x40, 0xAABB_CCDD, ByteMask::BYTE0 | ByteMask::BYTE3);
    assert_eq!(model.read(0x40), 0xAA00_00DD);
    assert_eq!(model.read(0x42), 0xAA00_00DD);
    assert_eq!(model.read(0x44), 0x44);
}

#[test]
fn test_reference_model_zero_init() {
    let model = ReferenceModel::new(0x100, InitPattern::Zero);
    assert!(model.words().iter().all(|&w| w == 0));
    assert_eq!(model.words().len(), 0x40);
}

#[test]
fn test_clean_run() {
    let accesses = parse_trace(
        "R 0x100 miss\n\
         W 0x108 0x12345678 hit\n\
         W 0x10A 0xFFFF0000 0xC hit\n\
         R 0x108 hit\n",
    )
    .unwrap();

    let mut driver = driver();
    let report = driver.run(&accesses).unwrap();
    assert!(report.is_clean(), "{:?}", report.discrepancies);
    assert_eq!(driver.reference().read(0x108), 0xFFFF_5678);
    assert_eq!(driver.system().peek_word(0x108), 0xFFFF_5678);
}

#[test]
fn test_wrong_expectation_reported() {
    let mut driver = driver();
    driver.apply(&Access::read(0x100).expecting(true)).unwrap();

    let report = driver.report();
    assert_eq!(
        report.discrepancies,
        vec![Discrepancy::HitMiss {
            access: 0,
            address: 0x100,
            expected: true,
            actual: false,
        }]
    );
    assert!(!report.is_clean());
}

#[test]
fn test_restored_dirty_state_seeds_reference() {
    let mut system = CacheSystem::new(SimConfig::default()).unwrap();
    system.access(CpuRequest::write(0x300, 0x7777_7777)).unwrap();
    let restored = CacheSystem::restore(&system.snapshot().unwrap()).unwrap();

    let mut driver = Driver::new(restored);
    assert_eq!(driver.reference().read(0x300), 0x7777_7777);

    let report = driver.run(&[Access::read(0x300).expecting(true)]).unwrap();
    assert!(report.is_clean(), "{:?}", report.discrepancies);
}

#[test]
fn test_report_serializes() {
    let mut driver = driver();
    driver.apply(&Access::read(0x100).expecting(true)).unwrap();

    let json = serde_json::to_value(driver.report()).unwrap();
    assert_eq!(json["accesses"], 1);
    assert_eq!(json["discrepancies"][0]["kind"], "hit_miss");
    assert_eq!(json["stats"]["misses"], 1);
}

#[test]
fn test_discrepancy_display() {
    let text = Discrepancy::Coherence {
        address: 0x200,
        expected: 0xDEAD_BEEF,
        actual: 0x200,
    }
    .to_string();
    assert_eq!(text, "word 0x00000200 holds 0x00000200, expected 0xDEADBEEF");
}
