//! Runtime tests driving [`crate::run`] with captured streams.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use lspbench_config::BenchConfig;
use ortho_config::OrthoError;
use rstest::rstest;
use tempfile::TempDir;

use crate::config::ConfigLoader;

/// Returns a fixed configuration and records what it was asked to load.
#[derive(Default)]
struct RecordingLoader {
    seen: RefCell<Vec<OsString>>,
}

impl ConfigLoader for RecordingLoader {
    fn load(&self, args: &[OsString]) -> Result<BenchConfig, Arc<OrthoError>> {
        self.seen.borrow_mut().extend(args.iter().cloned());
        Ok(BenchConfig::default())
    }
}

struct Captured {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

fn run(args: &[&str]) -> Captured {
    let args = std::iter::once("lspbench")
        .chain(args.iter().copied())
        .map(OsString::from);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = crate::run(args, &mut stdout, &mut stderr);
    Captured {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout is UTF-8"),
        stderr: String::from_utf8(stderr).expect("stderr is UTF-8"),
    }
}

#[rstest]
fn missing_workspace_fails() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("absent");

    let captured = run(&["--workspace", &missing.to_string_lossy()]);

    assert_eq!(captured.exit, ExitCode::FAILURE);
    assert!(captured.stderr.contains("ERROR: workspace does not exist"));
}

#[rstest]
fn help_goes_to_stdout() {
    let captured = run(&["--help"]);

    assert_eq!(captured.exit, ExitCode::SUCCESS);
    assert!(captured.stdout.contains("--workspace"));
    assert!(captured.stderr.is_empty());
}

#[rstest]
fn unknown_flag_is_a_usage_error() {
    let captured = run(&["--workspace", ".", "--frobnicate"]);

    assert_eq!(captured.exit, ExitCode::FAILURE);
    assert!(captured.stderr.contains("--frobnicate"));
}

#[rstest]
fn unreadable_configuration_fails() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("bench.toml");
    fs::write(&config, "iterations = \"many\"\n").expect("write config");

    let captured = run(&[
        "--workspace",
        &dir.path().to_string_lossy(),
        "--config-path",
        &config.to_string_lossy(),
    ]);

    assert_eq!(captured.exit, ExitCode::FAILURE);
    assert!(captured.stderr.contains("failed to load configuration"));
}

#[rstest]
fn missing_servers_are_skipped_with_warnings() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("Library.fs"), "let value = 1\n").expect("write source");
    let absent = dir.path().join("missing-server");

    let captured = run(&[
        "--workspace",
        &dir.path().to_string_lossy(),
        "--primary",
        &absent.to_string_lossy(),
        "--baseline-name",
        "lspbench-test-absent-baseline",
    ]);

    assert_eq!(captured.exit, ExitCode::SUCCESS);
    assert!(captured.stdout.contains("Workspace: "));
    assert!(
        captured
            .stdout
            .contains("WARNING: fsharp-lsp not found. Use --primary to specify path.")
    );
    assert!(
        captured
            .stdout
            .contains("WARNING: lspbench-test-absent-baseline not found. Use --baseline")
    );
    assert!(captured.stdout.contains("No results were recorded"));
    assert!(!dir.path().join(".lspbench").exists());
}

#[rstest]
fn only_limits_discovery_to_one_side() {
    let dir = TempDir::new().expect("temp dir");
    let absent = dir.path().join("missing-server");

    let captured = run(&[
        "--workspace",
        &dir.path().to_string_lossy(),
        "--only",
        "primary",
        "--primary",
        &absent.to_string_lossy(),
    ]);

    assert_eq!(captured.exit, ExitCode::SUCCESS);
    assert!(captured.stdout.contains("WARNING: fsharp-lsp not found"));
    assert!(!captured.stdout.contains("fsautocomplete"));
}

#[rstest]
fn configuration_flags_reach_the_loader_only() {
    let dir = TempDir::new().expect("temp dir");
    let workspace = dir.path().to_string_lossy().into_owned();
    let absent = dir.path().join("missing-server").to_string_lossy().into_owned();
    let loader = RecordingLoader::default();
    let args = [
        "lspbench",
        "--index-settle",
        "5s",
        "--workspace",
        workspace.as_str(),
        "--only",
        "primary",
        "--primary",
        absent.as_str(),
        "--log-format=json",
    ]
    .map(OsString::from);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let exit = crate::run_with_loader(args, &mut stdout, &mut stderr, &loader);

    assert_eq!(exit, ExitCode::SUCCESS);
    assert_eq!(
        *loader.seen.borrow(),
        ["lspbench", "--index-settle", "5s", "--log-format=json"].map(OsString::from)
    );
}

#[rstest]
fn usage_errors_skip_configuration_loading() {
    let loader = RecordingLoader::default();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let exit = crate::run_with_loader(
        ["lspbench", "--iterations", "2"].map(OsString::from),
        &mut stdout,
        &mut stderr,
        &loader,
    );

    assert_eq!(exit, ExitCode::FAILURE);
    assert!(loader.seen.borrow().is_empty());
}
