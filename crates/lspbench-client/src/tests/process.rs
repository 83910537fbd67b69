//! Sessions backed by real child processes.

use std::thread;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use crate::error::SupervisorError;
use crate::memory::MemoryReading;
use crate::session::{ServerSession, SessionOptions};
use crate::supervisor::ServerCommand;

#[fixture]
fn options() -> SessionOptions {
    SessionOptions {
        spawn_settle: Duration::from_millis(10),
        request_timeout: Duration::from_millis(200),
        shutdown_timeout: Duration::from_millis(200),
    }
}

#[rstest]
fn missing_binary_fails_to_spawn(options: SessionOptions) {
    let command = ServerCommand::new("/nonexistent/bin/fsharp-lsp");

    let result = ServerSession::spawn("primary", &command, options);

    assert!(matches!(result, Err(SupervisorError::BinaryNotFound { .. })));
}

#[cfg(unix)]
#[rstest]
fn exited_process_reports_memory_unavailable(options: SessionOptions) {
    let (mut session, elapsed) =
        ServerSession::spawn("short-lived", &ServerCommand::new("true"), options)
            .expect("spawn true");
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.sample_memory() != MemoryReading::Unavailable && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    assert!(elapsed >= options.spawn_settle);
    assert_eq!(session.sample_memory(), MemoryReading::Unavailable);
    session.shutdown();
}

#[cfg(unix)]
#[rstest]
fn unresponsive_process_is_reclaimed_on_shutdown(options: SessionOptions) {
    let command = ServerCommand::new("sleep").with_args(["30"]);
    let (mut session, _) = ServerSession::spawn("mute", &command, options).expect("spawn sleep");
    assert!(session.pid().is_some());

    let started = Instant::now();
    session.shutdown();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(session.sample_memory(), MemoryReading::Unavailable);
}

#[cfg(target_os = "linux")]
#[rstest]
fn running_process_reports_resident_memory(options: SessionOptions) {
    let command = ServerCommand::new("sleep").with_args(["30"]);
    let (mut session, _) = ServerSession::spawn("mute", &command, options).expect("spawn sleep");

    let reading = session.sample_memory();
    session.shutdown();

    assert!(reading.megabytes().is_some_and(|megabytes| megabytes > 0.0));
}
