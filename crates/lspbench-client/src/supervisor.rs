//! Spawning and reclaiming language server processes.
//!
//! A spawned server has its stdin and stdout piped for protocol traffic.
//! Stderr is piped separately and drained on a background thread into the
//! tracing log so it never interleaves with frames. [`ServerProcess`] kills
//! the child when dropped, so the process is released on every exit path.

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::SupervisorError;

/// Log target for supervisor operations.
const SUPERVISOR_TARGET: &str = "lspbench_client::supervisor";

/// Log target for lines a server writes to stderr.
const STDERR_TARGET: &str = "lspbench_client::stderr";

/// Interval between exit checks while waiting for termination.
const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How to launch a language server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// The executable path or command name.
    pub program: PathBuf,
    /// Arguments to pass to the language server.
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
}

impl ServerCommand {
    /// Creates a command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets a custom working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// A freshly spawned server with its protocol pipes.
#[derive(Debug)]
pub struct Spawned {
    /// Owned process handle.
    pub process: ServerProcess,
    /// Pipe carrying client-to-server frames.
    pub stdin: ChildStdin,
    /// Pipe carrying server-to-client frames.
    pub stdout: ChildStdout,
}

/// How a server process ended during [`ServerProcess::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process had already exited.
    AlreadyExited,
    /// The process exited within the grace period.
    Exited,
    /// The process was forcibly killed after the grace period.
    Killed,
}

/// Launches `command` and waits `settle` before returning.
///
/// The returned duration covers the spawn and the settle delay.
///
/// # Errors
///
/// Returns [`SupervisorError::BinaryNotFound`] when the executable does not
/// exist, [`SupervisorError::SpawnFailed`] for other spawn failures, and
/// [`SupervisorError::PipeUnavailable`] if a pipe cannot be captured.
pub fn start(
    command: &ServerCommand,
    settle: Duration,
) -> Result<(Spawned, Duration), SupervisorError> {
    let started = Instant::now();
    debug!(
        target: SUPERVISOR_TARGET,
        command = %command.program.display(),
        args = ?command.args,
        "spawning language server process"
    );

    let mut builder = Command::new(&command.program);
    builder
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &command.working_dir {
        builder.current_dir(dir);
    }

    let mut child = builder.spawn().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SupervisorError::BinaryNotFound {
                command: command.program.display().to_string(),
                source,
            }
        } else {
            SupervisorError::SpawnFailed {
                message: format!("failed to start {}", command.program.display()),
                source,
            }
        }
    })?;

    let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
    let program = command.program.display().to_string();
    // Wrap before checking pipes so the child is reclaimed if one is missing.
    let process = ServerProcess { child, program };
    let (Some(stdin), Some(stdout), stderr) = pipes else {
        return Err(SupervisorError::PipeUnavailable {
            stream: "stdin or stdout",
        });
    };
    if let Some(stderr) = stderr {
        drain_stderr(&process.program, stderr);
    }

    debug!(
        target: SUPERVISOR_TARGET,
        pid = process.pid(),
        "language server process spawned"
    );

    thread::sleep(settle);
    Ok((
        Spawned {
            process,
            stdin,
            stdout,
        },
        started.elapsed(),
    ))
}

/// Forwards stderr lines to the log until the pipe closes.
fn drain_stderr(program: &str, stderr: ChildStderr) {
    let label = program.to_owned();
    let spawned = thread::Builder::new()
        .name(String::from("lsp-stderr"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                let Ok(text) = line else { break };
                trace!(target: STDERR_TARGET, server = %label, "{text}");
            }
        });
    if let Err(error) = spawned {
        warn!(
            target: SUPERVISOR_TARGET,
            %error,
            "failed to start stderr drain; server output will be discarded"
        );
    }
}

/// Exclusive owner of a running server process.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    program: String,
}

impl ServerProcess {
    /// Returns the operating system process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Returns true while the process has not exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Requests termination and waits up to `timeout`, killing the process
    /// if it is still alive afterwards.
    pub fn terminate(&mut self, timeout: Duration) -> Termination {
        if !self.is_running() {
            return Termination::AlreadyExited;
        }

        self.request_termination();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(
                        target: SUPERVISOR_TARGET,
                        program = %self.program,
                        ?status,
                        "language server exited"
                    );
                    return Termination::Exited;
                }
                Ok(None) => thread::sleep(TERMINATE_POLL_INTERVAL),
                Err(error) => {
                    warn!(
                        target: SUPERVISOR_TARGET,
                        program = %self.program,
                        %error,
                        "failed to check process status"
                    );
                    break;
                }
            }
        }

        warn!(
            target: SUPERVISOR_TARGET,
            program = %self.program,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "language server did not exit in time, killing"
        );
        self.kill();
        Termination::Killed
    }

    #[cfg(unix)]
    fn request_termination(&self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(self.child.id()) else {
            return;
        };
        if let Err(error) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
            debug!(
                target: SUPERVISOR_TARGET,
                program = %self.program,
                %error,
                "SIGTERM delivery failed"
            );
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&self) {}

    fn kill(&mut self) {
        if let Err(error) = self.child.kill() {
            debug!(
                target: SUPERVISOR_TARGET,
                program = %self.program,
                %error,
                "kill failed"
            );
        }
        if let Err(error) = self.child.wait() {
            debug!(
                target: SUPERVISOR_TARGET,
                program = %self.program,
                %error,
                "wait after kill failed"
            );
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                target: SUPERVISOR_TARGET,
                program = %self.program,
                "killing language server process on drop"
            );
            self.kill();
        }
    }
}
