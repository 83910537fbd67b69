//! Error types for the benchmark engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a benchmark run as a whole.
///
/// Failures confined to one server never surface here; they are recorded as
/// unsuccessful results or end that server's run early.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The workspace path does not exist or is not a directory.
    #[error("workspace does not exist: {path}")]
    WorkspaceMissing {
        /// The rejected path.
        path: PathBuf,
    },

    /// The result file could not be written.
    #[error("failed to write results to {path}: {source}")]
    Persist {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The results could not be serialised.
    #[error("failed to serialise results: {0}")]
    Serialize(#[from] serde_json::Error),
}
