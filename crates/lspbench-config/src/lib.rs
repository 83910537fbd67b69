//! Shared configuration for the language server benchmark.
//!
//! Every timing heuristic the benchmark relies on lives here rather than in
//! the engine: the settle delays are empirical and have no protocol signal
//! behind them, so operators need to tune them per server.
//!
//! [`BenchConfig`] is assembled by `ortho_config` from layered sources, each
//! overriding the one before:
//!
//! 1. built-in defaults;
//! 2. a TOML file, named with `--config-path` or `LSPBENCH_CONFIG_PATH`, or
//!    discovered as `.lspbench.toml`;
//! 3. `LSPBENCH_*` environment variables such as `LSPBENCH_INDEX_SETTLE`;
//! 4. command-line flags such as `--index-settle 5s`.
//!
//! Durations are written as human-readable strings such as `"250ms"` or
//! `"2s"` in every layer.

mod defaults;
mod delay;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_HANDSHAKE_SETTLE, DEFAULT_INDEX_SETTLE, DEFAULT_ITERATIONS, DEFAULT_LOG_FILTER,
    DEFAULT_OPEN_SETTLE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_SPAWN_SETTLE,
    default_log_filter_string, default_log_format,
};
pub use delay::Delay;
pub use logging::LogFormat;

/// Long flags understood by the configuration loader.
///
/// Must list every field of [`BenchConfig`] plus the loader's own
/// `--config-path`.
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--spawn-settle",
    "--handshake-settle",
    "--index-settle",
    "--open-settle",
    "--request-timeout",
    "--shutdown-timeout",
    "--iterations",
    "--log-filter",
    "--log-format",
];

/// Errors raised while interpreting configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration value could not be parsed.
    #[error("invalid duration '{value}': {source}")]
    Duration {
        /// The rejected text.
        value: String,
        /// Parser diagnostic.
        #[source]
        source: humantime::DurationError,
    },
}

/// Tunables for a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(prefix = "LSPBENCH_")]
pub struct BenchConfig {
    /// Delay after spawning a server before the first write.
    #[ortho_config(cli_short = 's')]
    pub spawn_settle: Delay,
    /// Delay after the `initialized` notification.
    #[ortho_config(cli_short = 'k')]
    pub handshake_settle: Delay,
    /// Delay before the first memory sample, giving the server time to index.
    #[ortho_config(cli_short = 'i')]
    pub index_settle: Delay,
    /// Delay after each `textDocument/didOpen` notification.
    #[ortho_config(cli_short = 'o')]
    pub open_settle: Delay,
    /// Read timeout for a single request.
    #[ortho_config(cli_short = 't')]
    pub request_timeout: Delay,
    /// Bounded wait for process termination during shutdown.
    #[ortho_config(cli_short = 'x')]
    pub shutdown_timeout: Delay,
    /// Number of probe iterations per server.
    #[ortho_config(cli_short = 'n')]
    pub iterations: u32,
    /// Tracing filter expression.
    #[ortho_config(cli_short = 'l')]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(cli_short = 'f')]
    pub log_format: LogFormat,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            spawn_settle: Delay::new(DEFAULT_SPAWN_SETTLE),
            handshake_settle: Delay::new(DEFAULT_HANDSHAKE_SETTLE),
            index_settle: Delay::new(DEFAULT_INDEX_SETTLE),
            open_settle: Delay::new(DEFAULT_OPEN_SETTLE),
            request_timeout: Delay::new(DEFAULT_REQUEST_TIMEOUT),
            shutdown_timeout: Delay::new(DEFAULT_SHUTDOWN_TIMEOUT),
            iterations: DEFAULT_ITERATIONS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl BenchConfig {
    /// Delay after spawning a server before the first write.
    #[must_use]
    pub const fn spawn_settle(&self) -> Duration {
        self.spawn_settle.get()
    }

    /// Delay after the `initialized` notification.
    #[must_use]
    pub const fn handshake_settle(&self) -> Duration {
        self.handshake_settle.get()
    }

    /// Delay before the first memory sample.
    #[must_use]
    pub const fn index_settle(&self) -> Duration {
        self.index_settle.get()
    }

    /// Delay after each `textDocument/didOpen` notification.
    #[must_use]
    pub const fn open_settle(&self) -> Duration {
        self.open_settle.get()
    }

    /// Read timeout for a single request.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout.get()
    }

    /// Bounded wait for process termination during shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout.get()
    }

    /// Returns the tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Parses a human-readable duration such as `"250ms"` or `"2s"`.
///
/// # Errors
///
/// Returns [`ConfigError::Duration`] when the text is not a valid duration.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(text.trim()).map_err(|source| ConfigError::Duration {
        value: text.to_owned(),
        source,
    })
}
