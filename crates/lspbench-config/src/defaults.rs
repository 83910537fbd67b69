use std::time::Duration;

use crate::logging::LogFormat;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default number of probe iterations per server.
pub const DEFAULT_ITERATIONS: u32 = 3;

/// Delay after spawning a server before the first write.
pub const DEFAULT_SPAWN_SETTLE: Duration = Duration::from_millis(100);

/// Delay after the `initialized` notification.
pub const DEFAULT_HANDSHAKE_SETTLE: Duration = Duration::from_millis(500);

/// Delay granted to the server to build its index before measuring.
pub const DEFAULT_INDEX_SETTLE: Duration = Duration::from_secs(2);

/// Delay after each `textDocument/didOpen` notification.
pub const DEFAULT_OPEN_SETTLE: Duration = Duration::from_millis(100);

/// Upper bound on a single request round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on waiting for a server process to terminate.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
