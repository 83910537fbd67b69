//! Recorded measurements.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The benchmarked operations, in the order a run records them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// Spawning the server process, including the spawn settle delay.
    ProcessStart,
    /// The `initialize` round trip.
    Initialize,
    /// Resident memory once indexing has settled.
    MemoryAfterInit,
    /// `textDocument/definition`.
    GoToDefinition,
    /// `workspace/symbol`, for both the prefix and the contains query.
    WorkspaceSymbol,
    /// `textDocument/references`.
    FindReferences,
    /// `textDocument/hover`.
    Hover,
    /// `textDocument/completion`.
    Completion,
    /// Resident memory after the last iteration.
    MemoryFinal,
}

/// Whether a recorded value is a latency or a memory size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Milliseconds; lower is faster.
    Latency,
    /// Megabytes; lower is leaner.
    Memory,
}

impl MetricKind {
    /// Classifies a recorded operation name.
    ///
    /// Works on names rather than [`Operation`] so results loaded from disk
    /// classify the same way.
    #[must_use]
    pub fn of(operation: &str) -> Self {
        if operation.starts_with("memory") {
            Self::Memory
        } else {
            Self::Latency
        }
    }
}

impl Operation {
    /// Stable name written to the result file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProcessStart => "process-start",
            Self::Initialize => "initialize",
            Self::MemoryAfterInit => "memory-after-init",
            Self::GoToDefinition => "go-to-definition",
            Self::WorkspaceSymbol => "workspace-symbol",
            Self::FindReferences => "find-references",
            Self::Hover => "hover",
            Self::Completion => "completion",
            Self::MemoryFinal => "memory-final",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measurement of one operation against one server.
///
/// For memory operations `duration_ms` holds megabytes. Field order is the
/// serialised key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    operation: String,
    lsp: String,
    duration_ms: f64,
    success: bool,
    details: String,
}

impl BenchmarkResult {
    /// Records a timed operation.
    #[must_use]
    pub fn timed(
        operation: Operation,
        server: &str,
        elapsed: Duration,
        success: bool,
        details: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.as_str().to_owned(),
            lsp: server.to_owned(),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            success,
            details: details.into(),
        }
    }

    /// Records a memory sample in megabytes.
    #[must_use]
    pub fn memory(operation: Operation, server: &str, megabytes: f64) -> Self {
        Self {
            operation: operation.as_str().to_owned(),
            lsp: server.to_owned(),
            duration_ms: megabytes,
            success: true,
            details: format!("{megabytes:.1} MB"),
        }
    }

    /// Operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Server display name.
    #[must_use]
    pub fn lsp(&self) -> &str {
        &self.lsp
    }

    /// Milliseconds, or megabytes for memory operations.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.duration_ms
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    /// Free-text details.
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Whether the value is a latency or a memory size.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        MetricKind::of(&self.operation)
    }
}
