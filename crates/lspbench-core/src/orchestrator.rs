//! Sequencing a benchmark run.
//!
//! Servers are measured one after another, never concurrently. Each run
//! walks the states in [`RunState`]: spawn, handshake, an index settle delay,
//! a memory sample, the probe iterations, a final memory sample and
//! shutdown. A server that cannot be started or initialised ends in
//! [`RunState::Skipped`]; any process that was started is shut down first.

use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use lspbench_client::{
    MemoryReading, ServerCommand, ServerSession, SessionError, SessionOptions, SupervisorError,
};
use lspbench_config::BenchConfig;
use tracing::{debug, info, warn};

use crate::compare::Comparison;
use crate::console::Console;
use crate::error::BenchError;
use crate::handshake::{handshake, open_document};
use crate::probe::ITERATION;
use crate::result::{BenchmarkResult, Operation};
use crate::store::ResultStore;
use crate::workload::{Workload, WorkloadSelector, WorkspaceRoot};

const ORCHESTRATOR_TARGET: &str = "lspbench_core::orchestrator";

/// A server to benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    /// Display name recorded with every result.
    pub name: String,
    /// How to launch it.
    pub command: ServerCommand,
}

impl ServerSpec {
    /// Creates a spec.
    #[must_use]
    pub fn new(name: impl Into<String>, command: ServerCommand) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }
}

/// Opens sessions for the orchestrator.
pub trait ServerLauncher {
    /// Starts the server described by `spec`, returning the session and the
    /// time taken including the spawn settle delay.
    ///
    /// # Errors
    ///
    /// Returns a [`SupervisorError`] when the server cannot be started.
    fn launch(
        &mut self,
        spec: &ServerSpec,
        options: SessionOptions,
    ) -> Result<(ServerSession, Duration), SupervisorError>;
}

impl<L: ServerLauncher + ?Sized> ServerLauncher for &mut L {
    fn launch(
        &mut self,
        spec: &ServerSpec,
        options: SessionOptions,
    ) -> Result<(ServerSession, Duration), SupervisorError> {
        (**self).launch(spec, options)
    }
}

/// Launches servers as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ServerLauncher for ProcessLauncher {
    fn launch(
        &mut self,
        spec: &ServerSpec,
        options: SessionOptions,
    ) -> Result<(ServerSession, Duration), SupervisorError> {
        ServerSession::spawn(spec.name.as_str(), &spec.command, options)
    }
}

/// Why a server run ended without measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The workspace holds no matching source file.
    NoWorkload,
    /// The server binary does not exist.
    BinaryNotFound,
    /// The server process could not be started.
    SpawnFailed,
    /// The `initialize` exchange failed.
    HandshakeFailed,
}

/// Progress of a single server run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has happened yet.
    NotStarted,
    /// The process is running.
    Spawned,
    /// `initialize` and `initialized` were exchanged.
    Handshaken,
    /// The index settle delay has elapsed.
    Indexed,
    /// Running the given iteration, counting from one.
    Iterating(u32),
    /// Shutdown is in progress.
    ShuttingDown,
    /// The run completed.
    Done,
    /// The run ended early.
    Skipped(SkipReason),
}

/// Outcome of one server run.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerReport {
    /// Server display name.
    pub name: String,
    /// Final state; [`RunState::Done`] or [`RunState::Skipped`].
    pub state: RunState,
    /// Results in recording order.
    pub results: Vec<BenchmarkResult>,
}

/// State and results accumulated while running one server.
struct Tracker {
    name: String,
    state: RunState,
    results: Vec<BenchmarkResult>,
}

impl Tracker {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: RunState::NotStarted,
            results: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!(
            target: ORCHESTRATOR_TARGET,
            server = %self.name,
            from = ?self.state,
            to = ?next,
            "run state changed"
        );
        self.state = next;
    }

    fn record(&mut self, result: BenchmarkResult) {
        self.results.push(result);
    }

    fn finish(self) -> ServerReport {
        ServerReport {
            name: self.name,
            state: self.state,
            results: self.results,
        }
    }
}

/// Everything a finished benchmark produced.
#[derive(Debug)]
pub struct BenchOutcome {
    /// Per-server reports in run order.
    pub reports: Vec<ServerReport>,
    /// Comparison of the two sides, when any results exist.
    pub comparison: Option<Comparison>,
    /// Result file, when one was written.
    pub persisted: Option<PathBuf>,
}

impl BenchOutcome {
    /// All results across servers, in run order.
    #[must_use]
    pub fn results(&self) -> Vec<BenchmarkResult> {
        self.reports
            .iter()
            .flat_map(|report| report.results.iter().cloned())
            .collect()
    }
}

/// Drives servers through the benchmark sequence.
pub struct Orchestrator<'a, L, W> {
    root: &'a WorkspaceRoot,
    config: &'a BenchConfig,
    selector: WorkloadSelector,
    launcher: L,
    console: Console<W>,
}

impl<'a, L, W> Orchestrator<'a, L, W>
where
    L: ServerLauncher,
    W: Write,
{
    /// Creates an orchestrator writing progress to `out`.
    pub fn new(root: &'a WorkspaceRoot, config: &'a BenchConfig, launcher: L, out: W) -> Self {
        Self {
            root,
            config,
            selector: WorkloadSelector::default(),
            launcher,
            console: Console::new(out),
        }
    }

    /// Replaces the workload selector.
    #[must_use]
    pub fn with_selector(mut self, selector: WorkloadSelector) -> Self {
        self.selector = selector;
        self
    }

    /// The progress console, for callers adding their own lines.
    pub const fn console(&mut self) -> &mut Console<W> {
        &mut self.console
    }

    /// Returns the progress sink.
    #[must_use]
    pub fn into_output(self) -> W {
        self.console.into_inner()
    }

    /// Benchmarks each server in turn.
    pub fn run(&mut self, specs: &[ServerSpec]) -> Vec<ServerReport> {
        specs.iter().map(|spec| self.run_server(spec)).collect()
    }

    /// Benchmarks a single server.
    pub fn run_server(&mut self, spec: &ServerSpec) -> ServerReport {
        let mut run = Tracker::new(&spec.name);
        let rule = "=".repeat(60);
        self.console.blank();
        self.console.line(format_args!("{rule}"));
        self.console.line(format_args!("Benchmarking: {}", spec.name));
        self.console.line(format_args!("{rule}"));

        let Some(workload) = self.selector.select(self.root) else {
            warn!(
                target: ORCHESTRATOR_TARGET,
                server = %spec.name,
                workspace = %self.root.path().display(),
                "no source files found"
            );
            self.console.line(format_args!(
                "  WARNING: no files found in {}",
                self.root.path().display()
            ));
            run.advance(RunState::Skipped(SkipReason::NoWorkload));
            return run.finish();
        };
        self.console.line(format_args!("  Test file: {}", workload.path().display()));
        self.console.line(format_args!(
            "  Test position: line {}, col {}",
            workload.line(),
            workload.column()
        ));

        self.console.blank();
        self.console.line(format_args!("  Starting server..."));
        let options = SessionOptions::from_config(self.config);
        let (mut session, spawn_elapsed) = match self.launcher.launch(spec, options) {
            Ok(launched) => launched,
            Err(error) => {
                warn!(target: ORCHESTRATOR_TARGET, server = %spec.name, %error, "server failed to start");
                self.console.line(format_args!("  ERROR: failed to start server: {error}"));
                let reason = match error {
                    SupervisorError::BinaryNotFound { .. } => SkipReason::BinaryNotFound,
                    SupervisorError::SpawnFailed { .. } | SupervisorError::PipeUnavailable { .. } => {
                        SkipReason::SpawnFailed
                    }
                };
                run.advance(RunState::Skipped(reason));
                return run.finish();
            }
        };

        run.advance(RunState::Spawned);
        run.record(BenchmarkResult::timed(
            Operation::ProcessStart,
            &spec.name,
            spawn_elapsed,
            true,
            "process spawned",
        ));
        self.console
            .line(format_args!("  Process start: {:.1}ms", millis(spawn_elapsed)));

        let measured = self.measure(&mut session, &workload, &mut run);

        run.advance(RunState::ShuttingDown);
        self.console.line(format_args!("  Shutting down..."));
        session.shutdown();
        run.advance(measured.map_or_else(RunState::Skipped, |()| RunState::Done));
        info!(
            target: ORCHESTRATOR_TARGET,
            server = %spec.name,
            results = run.results.len(),
            state = ?run.state,
            "server run finished"
        );
        run.finish()
    }

    fn measure(
        &mut self,
        session: &mut ServerSession,
        workload: &Workload,
        run: &mut Tracker,
    ) -> Result<(), SkipReason> {
        self.console.line(format_args!("  Initializing..."));
        match handshake(session, self.root, self.config.handshake_settle()) {
            Ok(elapsed) => {
                run.record(BenchmarkResult::timed(
                    Operation::Initialize,
                    &run.name,
                    elapsed,
                    true,
                    "initialized + indexed",
                ));
                self.console
                    .line(format_args!("  Initialize: {:.1}ms", millis(elapsed)));
                run.advance(RunState::Handshaken);
            }
            Err(error) => {
                warn!(target: ORCHESTRATOR_TARGET, server = %run.name, %error, "handshake failed");
                self.console
                    .line(format_args!("  ERROR: failed to initialize: {error}"));
                return Err(SkipReason::HandshakeFailed);
            }
        }

        self.console.line(format_args!("  Waiting for index to build..."));
        thread::sleep(self.config.index_settle());
        run.advance(RunState::Indexed);
        self.record_memory(session, run, Operation::MemoryAfterInit, "Memory after init");

        self.iterate(session, workload, run);

        self.console.blank();
        self.record_memory(session, run, Operation::MemoryFinal, "Final memory");
        Ok(())
    }

    fn iterate(&mut self, session: &mut ServerSession, workload: &Workload, run: &mut Tracker) {
        let total = self.config.iterations;
        for iteration in 1..=total {
            run.advance(RunState::Iterating(iteration));
            self.console.blank();
            self.console
                .line(format_args!("  --- Iteration {iteration}/{total} ---"));

            if let Err(error) = open_document(session, workload, self.config.open_settle())
                && self.connection_lost(run, &error)
            {
                return;
            }

            for probe in ITERATION {
                let started = Instant::now();
                let result = match probe.run(session, workload) {
                    Ok(result) => result,
                    Err(error) if self.connection_lost(run, &error) => return,
                    Err(error) => probe.failed(&run.name, started, &error),
                };
                let status = if result.success() { "OK" } else { "FAIL" };
                self.console.line(format_args!(
                    "  {}: {:.2}ms [{status}] ({})",
                    probe.label(),
                    result.value(),
                    result.details()
                ));
                run.record(result);
            }
        }
    }

    /// Reports `error` and returns true when it ends the session.
    fn connection_lost(&mut self, run: &Tracker, error: &SessionError) -> bool {
        if !error.is_transport_closed() {
            debug!(target: ORCHESTRATOR_TARGET, server = %run.name, %error, "probe failed");
            return false;
        }
        warn!(
            target: ORCHESTRATOR_TARGET,
            server = %run.name,
            %error,
            "connection lost; abandoning remaining iterations"
        );
        self.console
            .line(format_args!("  ERROR: connection to server lost: {error}"));
        true
    }

    fn record_memory(
        &mut self,
        session: &mut ServerSession,
        run: &mut Tracker,
        operation: Operation,
        label: &str,
    ) {
        match session.sample_memory() {
            MemoryReading::Megabytes(megabytes) => {
                run.record(BenchmarkResult::memory(operation, &run.name, megabytes));
                self.console
                    .line(format_args!("  {label}: {megabytes:.1} MB"));
            }
            MemoryReading::Unavailable => {
                debug!(
                    target: ORCHESTRATOR_TARGET,
                    server = %run.name,
                    operation = operation.as_str(),
                    "memory sample unavailable"
                );
            }
        }
    }

    /// Prints the comparison and persists all results.
    ///
    /// Nothing is printed or written when no server produced results.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError`] when the result file cannot be written.
    pub fn finish(
        &mut self,
        reports: Vec<ServerReport>,
        store: &ResultStore,
        primary: &str,
        baseline: &str,
    ) -> Result<BenchOutcome, BenchError> {
        let mut outcome = BenchOutcome {
            reports,
            comparison: None,
            persisted: None,
        };
        let results = outcome.results();
        if results.is_empty() {
            self.console.blank();
            self.console
                .line(format_args!("No results were recorded; nothing to compare."));
            return Ok(outcome);
        }

        let comparison = Comparison::build(&results, primary, baseline);
        let rule = "=".repeat(80);
        self.console.blank();
        self.console.line(format_args!("{rule}"));
        self.console.line(format_args!("BENCHMARK SUMMARY"));
        self.console.line(format_args!("{rule}"));
        self.console.blank();
        self.console.line(format_args!("{}", comparison.to_string().trim_end()));

        if store.persist(&results)? {
            self.console.blank();
            self.console.line(format_args!(
                "Detailed results saved to: {}",
                store.path().display()
            ));
            outcome.persisted = Some(store.path().to_path_buf());
        }
        outcome.comparison = Some(comparison);
        Ok(outcome)
    }
}

const fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
