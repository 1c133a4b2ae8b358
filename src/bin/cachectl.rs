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

//! cachectl entry point
//!
//! Runs an access trace through the cache controller, checks every result
//! against the reference model, and prints a report.

use cachectl::core::config::SimConfig;
use cachectl::core::harness::{load_trace, Driver, Report};
use cachectl::core::system::CacheSystem;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Access trace to run
    #[arg(short, long)]
    trace: PathBuf,

    /// TOML configuration (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override cache associativity
    #[arg(short, long)]
    associativity: Option<usize>,

    /// Override backing-store latency in cycles
    #[arg(short, long)]
    latency: Option<u32>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Resume from a saved state instead of a cold cache
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Save the final state
    #[arg(long)]
    save_state: Option<PathBuf>,
}

fn build_system(args: &Args) -> cachectl::Result<CacheSystem> {
    if let Some(path) = &args.load_state {
        if args.config.is_some() || args.associativity.is_some() || args.latency.is_some() {
            log::warn!("Configuration options are ignored when loading a saved state");
        }
        return CacheSystem::load_state(path);
    }

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Config: {}", path.display());
            SimConfig::load(path)?
        }
        None => SimConfig::default(),
    };
    if let Some(associativity) = args.associativity {
        config.cache.associativity = associativity;
    }
    if let Some(latency) = args.latency {
        config.memory.latency = latency;
    }

    CacheSystem::new(config)
}

fn print_text(system: &CacheSystem, report: &Report) {
    let geometry = system.geometry();
    let stats = &report.stats;

    println!(
        "cache: {} bytes, {} sets x {} ways, {}-byte blocks ({})",
        geometry.capacity(),
        geometry.sets(),
        geometry.associativity(),
        geometry.block_size(),
        system.controller().store().policy().name()
    );
    println!("accesses:   {}", report.accesses);
    println!("reads:      {}", stats.reads);
    println!("writes:     {}", stats.writes);
    println!("hits:       {}", stats.hits);
    println!("misses:     {}", stats.misses);
    println!("hit rate:   {:.2}%", stats.hit_rate() * 100.0);
    println!("writebacks: {}", stats.writebacks);
    println!("fills:      {}", stats.fills);
    println!("cycles:     {}", report.cycles);

    if report.is_clean() {
        println!("result:     PASS");
    } else {
        println!("result:     FAIL ({} discrepancies)", report.discrepancies.len());
        for discrepancy in &report.discrepancies {
            println!("  {}", discrepancy);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Environment (.env) before logging so RUST_LOG can come from it
    dotenvy::dotenv().ok();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let system = build_system(&args)?;
    let accesses = load_trace(&args.trace)?;
    log::info!("Trace: {} ({} accesses)", args.trace.display(), accesses.len());

    let mut driver = Driver::new(system);
    let report = driver.run(&accesses)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(driver.system(), &report);
    }

    if let Some(path) = &args.save_state {
        driver.system().save_state(path)?;
    }

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}
