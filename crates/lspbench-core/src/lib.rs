//! Benchmark engine for comparing two language servers.
//!
//! A run picks a representative source file from the workspace
//! ([`workload`]), drives each server through the same handshake and probe
//! sequence ([`orchestrator`], [`probe`]), records every measurement as a
//! [`BenchmarkResult`], and finally prints a side-by-side [`Comparison`]
//! and persists the raw results through a [`ResultStore`].

pub mod compare;
pub mod console;
mod error;
pub mod handshake;
pub mod orchestrator;
pub mod probe;
pub mod result;
pub mod store;
pub mod workload;

pub use compare::{Comparison, ComparisonRow, Verdict};
pub use console::Console;
pub use error::BenchError;
pub use orchestrator::{
    BenchOutcome, Orchestrator, ProcessLauncher, RunState, ServerLauncher, ServerReport,
    ServerSpec, SkipReason,
};
pub use probe::{ITERATION, Probe, SymbolQuery};
pub use result::{BenchmarkResult, MetricKind, Operation};
pub use store::ResultStore;
pub use workload::{Workload, WorkloadSelector, WorkspaceRoot};

#[cfg(test)]
mod tests;
