//! Shared fixtures for orchestrator tests.

mod launcher;
mod world;

use std::time::Duration;

use lspbench_config::{BenchConfig, Delay};
use rstest::fixture;

pub use launcher::ScriptedLauncher;
pub use world::{BASELINE, PRIMARY, TestWorld};

/// Configuration with every settle delay removed and a single iteration.
#[fixture]
pub fn fast_config() -> BenchConfig {
    BenchConfig {
        spawn_settle: Delay::ZERO,
        handshake_settle: Delay::ZERO,
        index_settle: Delay::ZERO,
        open_settle: Delay::ZERO,
        request_timeout: Duration::from_secs(5).into(),
        shutdown_timeout: Duration::from_secs(1).into(),
        iterations: 1,
        ..BenchConfig::default()
    }
}
