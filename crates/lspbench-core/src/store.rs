//! Result file persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BenchError;
use crate::result::BenchmarkResult;

/// Hidden state directory created inside the workspace.
pub const STATE_DIR: &str = ".lspbench";

/// File name of the result file within [`STATE_DIR`].
pub const RESULTS_FILE: &str = "benchmark-results.json";

const STORE_TARGET: &str = "lspbench_core::store";

/// Reads and writes the JSON result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    /// Store at the default location inside `workspace`.
    #[must_use]
    pub fn in_workspace(workspace: &Path) -> Self {
        Self::at(workspace.join(STATE_DIR).join(RESULTS_FILE))
    }

    /// Store at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the result file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `results` as a pretty-printed JSON array.
    ///
    /// Nothing is written for an empty list. The file is replaced atomically
    /// so readers never observe a partial document. Returns whether a file
    /// was written.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Persist`] when the directory or file cannot be
    /// written.
    pub fn persist(&self, results: &[BenchmarkResult]) -> Result<bool, BenchError> {
        if results.is_empty() {
            debug!(target: STORE_TARGET, "no results to persist");
            return Ok(false);
        }
        let mut document = serde_json::to_vec_pretty(results)?;
        document.push(b'\n');

        let staging = self.path.with_extension("json.tmp");
        self.write(&staging, &document)?;
        fs::rename(&staging, &self.path).map_err(|source| self.persist_error(source))?;
        debug!(
            target: STORE_TARGET,
            path = %self.path.display(),
            count = results.len(),
            "results persisted"
        );
        Ok(true)
    }

    /// Loads previously persisted results; an absent file yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Persist`] when the file exists but cannot be
    /// read and [`BenchError::Serialize`] when it is not a result array.
    pub fn load(&self) -> Result<Vec<BenchmarkResult>, BenchError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(self.persist_error(source)),
        }
    }

    fn write(&self, staging: &Path, document: &[u8]) -> Result<(), BenchError> {
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent).map_err(|source| self.persist_error(source))?;
        }
        fs::write(staging, document).map_err(|source| self.persist_error(source))
    }

    fn persist_error(&self, source: io::Error) -> BenchError {
        BenchError::Persist {
            path: self.path.clone(),
            source,
        }
    }
}
