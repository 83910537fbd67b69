//! Error types for the command-line runtime.

use std::io;
use std::sync::Arc;

use lspbench_core::BenchError;
use ortho_config::OrthoError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

/// Failures that leave the environment unusable; all exit non-zero.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(Arc<OrthoError>),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),
    #[error(transparent)]
    Bench(#[from] BenchError),
}
