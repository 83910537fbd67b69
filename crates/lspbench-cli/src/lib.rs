//! Command-line runtime for the language server benchmark.
//!
//! [`run`] parses arguments, loads the layered configuration, installs
//! telemetry, locates both server binaries and hands the located servers to
//! the benchmark engine. Progress and the summary table
//! go to the supplied stdout writer; diagnostics go to stderr.
//!
//! The process exits non-zero only when the environment is unusable: bad
//! arguments, an unreadable configuration file or a missing workspace. A
//! server that cannot be found or fails its probes is reported and the run
//! continues.

mod cli;
mod config;
mod discover;
mod errors;
mod telemetry;

use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use lspbench_client::ServerCommand;
use lspbench_config::BenchConfig;
use lspbench_core::{
    Orchestrator, ProcessLauncher, ResultStore, ServerSpec, WorkloadSelector, WorkspaceRoot,
};
use tracing::{info, warn};

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use discover::{Located, SideSpec};
use errors::CliError;

const CLI_TARGET: &str = "lspbench_cli";

/// Runs the benchmark with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli = match Cli::try_parse_from(&split.cli_arguments) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render().to_string();
            return if error.use_stderr() {
                report(stderr, &rendered);
                ExitCode::FAILURE
            } else {
                report(stdout, &rendered);
                ExitCode::SUCCESS
            };
        }
    };

    let outcome = loader
        .load(&split.config_arguments)
        .map_err(CliError::Config)
        .and_then(|config| benchmark(&cli, &config, stdout));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(stderr, &format!("ERROR: {error}\n"));
            ExitCode::FAILURE
        }
    }
}

fn report<S: Write>(sink: &mut S, text: &str) {
    if let Err(error) = sink.write_all(text.as_bytes()) {
        warn!(target: CLI_TARGET, %error, "failed to write diagnostics");
    }
}

fn benchmark<W: Write>(cli: &Cli, config: &BenchConfig, stdout: &mut W) -> Result<(), CliError> {
    telemetry::initialise(config)?;

    let root = WorkspaceRoot::open(&cli.workspace)?;
    let cwd = env::current_dir().map_err(CliError::CurrentDir)?;
    let home = dirs::home_dir();
    info!(
        target: CLI_TARGET,
        workspace = %root.path().display(),
        iterations = config.iterations,
        "starting benchmark"
    );

    let mut orchestrator = Orchestrator::new(&root, config, ProcessLauncher, &mut *stdout);
    if !cli.extensions.is_empty() {
        orchestrator = orchestrator.with_selector(WorkloadSelector::with_extensions(&cli.extensions));
    }
    orchestrator
        .console()
        .line(format_args!("Workspace: {}", root.path().display()));

    let search_path = env::var_os("PATH");
    let sides = [
        SideSpec::primary(cli, &cwd, home.as_deref()),
        SideSpec::baseline(cli, home.as_deref()),
    ];
    let mut specs = Vec::new();
    for side in sides.iter().filter(|side| cli.includes(side.side)) {
        match side.locate(search_path.as_deref(), &cwd) {
            Located::Found(path) => {
                info!(target: CLI_TARGET, server = %side.name, path = %path.display(), "server located");
                let command = ServerCommand::new(path)
                    .with_args(&side.args)
                    .with_working_dir(root.path());
                specs.push(ServerSpec::new(side.name.as_str(), command));
            }
            Located::Missing(tried) => {
                warn!(target: CLI_TARGET, server = %side.name, "server binary not found; skipping");
                let console = orchestrator.console();
                console.blank();
                console.line(format_args!(
                    "WARNING: {} not found. Use {} to specify path.",
                    side.name,
                    side.flag()
                ));
                console.line(format_args!("  Tried: {}", tried.join(", ")));
            }
        }
    }

    let reports = orchestrator.run(&specs);
    let store = cli
        .output
        .as_ref()
        .map_or_else(|| ResultStore::in_workspace(root.path()), ResultStore::at);
    let outcome = orchestrator.finish(reports, &store, &cli.primary_name, &cli.baseline_name)?;
    info!(
        target: CLI_TARGET,
        servers = outcome.reports.len(),
        persisted = outcome.persisted.is_some(),
        "benchmark finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests;
