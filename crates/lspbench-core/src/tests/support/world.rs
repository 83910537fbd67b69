//! Scenario state for behavioural tests.

use std::fs;
use std::path::PathBuf;

use lspbench_client::ServerCommand;
use lspbench_client::testing::FakeServer;
use lspbench_config::BenchConfig;
use tempfile::TempDir;

use super::{ScriptedLauncher, fast_config};
use crate::orchestrator::{BenchOutcome, Orchestrator, ServerSpec};
use crate::result::BenchmarkResult;
use crate::store::ResultStore;
use crate::workload::WorkspaceRoot;

/// Name of the server under test.
pub const PRIMARY: &str = "primary-lsp";
/// Name of the reference server.
pub const BASELINE: &str = "baseline-lsp";

pub struct TestWorld {
    workspace: TempDir,
    pub config: BenchConfig,
    pub launcher: ScriptedLauncher,
    pub runs: Vec<BenchOutcome>,
    pub output: String,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            workspace: TempDir::new().expect("create workspace"),
            config: fast_config(),
            launcher: ScriptedLauncher::default(),
            runs: Vec::new(),
            output: String::new(),
        }
    }

    pub fn add_source(&self, name: &str, text: &str) {
        fs::write(self.workspace.path().join(name), text).expect("write source file");
    }

    pub fn script(&mut self, name: &str, server: FakeServer) {
        self.launcher.register(name, server);
    }

    pub fn results_path(&self) -> PathBuf {
        ResultStore::in_workspace(self.root().path())
            .path()
            .to_path_buf()
    }

    fn root(&self) -> WorkspaceRoot {
        WorkspaceRoot::open(self.workspace.path()).expect("open workspace")
    }

    /// Benchmarks both servers and keeps the outcome and console text.
    pub fn run(&mut self) {
        let root = self.root();
        let store = ResultStore::in_workspace(root.path());
        let specs = [
            ServerSpec::new(PRIMARY, ServerCommand::new(PRIMARY)),
            ServerSpec::new(BASELINE, ServerCommand::new(BASELINE)),
        ];
        let mut orchestrator =
            Orchestrator::new(&root, &self.config, &mut self.launcher, Vec::new());
        let reports = orchestrator.run(&specs);
        let outcome = orchestrator
            .finish(reports, &store, PRIMARY, BASELINE)
            .expect("finish benchmark");
        let output = orchestrator.into_output();
        self.output = String::from_utf8(output).expect("console output is UTF-8");
        self.runs.push(outcome);
    }

    pub fn last(&self) -> &BenchOutcome {
        self.runs.last().expect("benchmark has run")
    }

    pub fn results_for(&self, server: &str, operation: &str) -> Vec<BenchmarkResult> {
        self.last()
            .results()
            .into_iter()
            .filter(|result| result.lsp() == server && result.operation() == operation)
            .collect()
    }
}
