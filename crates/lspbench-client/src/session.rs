//! A single language server session.
//!
//! [`ServerSession`] owns the request id counter, the protocol pipes and the
//! child process. At most one request is in flight at a time: each call to
//! [`ServerSession::send_request`] writes one request and consumes frames
//! until the matching reply arrives or the request times out.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use lspbench_config::BenchConfig;
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{SessionError, SupervisorError};
use crate::jsonrpc::{Message, Notification, Request, RequestId, Response};
use crate::memory::{MemoryProbe, MemoryReading, platform_probe};
use crate::pump::{FramePump, Wait};
use crate::supervisor::{self, ServerCommand, ServerProcess};

const SESSION_TARGET: &str = "lspbench_client::session";

/// Timing knobs applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Delay after spawning before the first write.
    pub spawn_settle: Duration,
    /// Upper bound on waiting for a single reply.
    pub request_timeout: Duration,
    /// Upper bound on the shutdown request and on process termination.
    pub shutdown_timeout: Duration,
}

impl SessionOptions {
    /// Extracts the session knobs from a benchmark configuration.
    #[must_use]
    pub const fn from_config(config: &BenchConfig) -> Self {
        Self {
            spawn_settle: config.spawn_settle(),
            request_timeout: config.request_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&BenchConfig::default())
    }
}

/// An open protocol session with one language server.
pub struct ServerSession {
    name: String,
    next_id: i64,
    writer: Option<Box<dyn Write + Send>>,
    frames: FramePump,
    options: SessionOptions,
    process: Option<ServerProcess>,
    memory: Box<dyn MemoryProbe>,
    closed: bool,
}

impl ServerSession {
    /// Spawns `command` and opens a session over its stdio pipes.
    ///
    /// The returned duration covers the spawn and the spawn settle delay.
    ///
    /// # Errors
    ///
    /// Returns a [`SupervisorError`] when the process cannot be started.
    pub fn spawn(
        name: impl Into<String>,
        command: &ServerCommand,
        options: SessionOptions,
    ) -> Result<(Self, Duration), SupervisorError> {
        let name = name.into();
        let (spawned, elapsed) = supervisor::start(command, options.spawn_settle)?;
        let mut session = Self::from_streams(name, spawned.stdout, spawned.stdin, options);
        session.process = Some(spawned.process);
        session.memory = platform_probe();
        Ok((session, elapsed))
    }

    /// Opens a session over arbitrary streams with no process behind it.
    ///
    /// Memory samples report [`MemoryReading::Unavailable`] until a probe is
    /// attached with [`ServerSession::with_memory_probe`].
    #[must_use]
    pub fn from_streams<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        options: SessionOptions,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let name = name.into();
        let frames = FramePump::start(&name, reader);
        Self {
            name,
            next_id: 1,
            writer: Some(Box::new(writer)),
            frames,
            options,
            process: None,
            memory: Box::new(crate::memory::FixedProbe(MemoryReading::Unavailable)),
            closed: false,
        }
    }

    /// Replaces the memory probe.
    #[must_use]
    pub fn with_memory_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Display name of the server.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process id of the server, when it runs as a child process.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(ServerProcess::pid)
    }

    /// Sends a request and waits for its reply.
    ///
    /// The duration runs from the completed write to the matching reply.
    /// Notifications and server-initiated requests arriving in between are
    /// logged and skipped, as are late replies to earlier timed-out requests.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when no reply arrives within the
    /// request timeout, [`SessionError::ResponseIdMismatch`] when the reply
    /// names an unknown request, [`SessionError::Closed`] after shutdown, and
    /// [`SessionError::Transport`] for framing or stream failures.
    pub fn send_request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(Response, Duration), SessionError> {
        let timeout = self.options.request_timeout;
        self.request_with_timeout(method, params, timeout)
    }

    /// Sends a notification; no reply is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after shutdown and
    /// [`SessionError::Transport`] when the write fails.
    pub fn send_notification(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), SessionError> {
        let writer = self.writer()?;
        codec::write_message(writer, &Notification::new(method, params))?;
        debug!(target: SESSION_TARGET, server = %self.name, method, "notification sent");
        Ok(())
    }

    /// Samples the server's resident memory.
    ///
    /// Never fails: an exited process or an unsupported platform yields
    /// [`MemoryReading::Unavailable`].
    pub fn sample_memory(&mut self) -> MemoryReading {
        let pid = match self.process.as_mut() {
            Some(process) => {
                if !process.is_running() {
                    return MemoryReading::Unavailable;
                }
                Some(process.pid())
            }
            None => None,
        };
        self.memory.sample(pid)
    }

    /// Ends the session: `shutdown` request, `exit` notification, then
    /// process termination.
    ///
    /// Failures in the protocol part are logged and ignored. Calling this
    /// more than once has no further effect.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }

        let timeout = self.options.shutdown_timeout;
        let graceful = self
            .request_with_timeout("shutdown", None, timeout)
            .and_then(|_| self.send_notification("exit", None));
        if let Err(error) = graceful {
            debug!(
                target: SESSION_TARGET,
                server = %self.name,
                %error,
                "graceful shutdown sequence failed"
            );
        }

        self.closed = true;
        self.writer = None;
        if let Some(process) = self.process.as_mut() {
            let outcome = process.terminate(timeout);
            debug!(target: SESSION_TARGET, server = %self.name, ?outcome, "server stopped");
        }
    }

    fn request_with_timeout(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<(Response, Duration), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let id = self.next_id;
        self.next_id += 1;

        let request = Request::new(id, method, params);
        codec::write_message(self.writer()?, &request)?;
        let started = Instant::now();
        let response = self.await_reply(id, method, timeout)?;
        let elapsed = started.elapsed();

        debug!(
            target: SESSION_TARGET,
            server = %self.name,
            id,
            method,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "request completed"
        );
        Ok((response, elapsed))
    }

    fn await_reply(
        &self,
        id: i64,
        method: &str,
        timeout: Duration,
    ) -> Result<Response, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let message = match self.frames.next(remaining) {
                Ok(message) => message,
                Err(Wait::TimedOut) => {
                    warn!(target: SESSION_TARGET, server = %self.name, id, method, "request timed out");
                    return Err(SessionError::Timeout {
                        method: method.to_owned(),
                        timeout,
                    });
                }
                Err(Wait::Codec(error)) => return Err(error.into()),
            };

            match message {
                Message::Response(response) => match Correlation::of(id, response.id.as_ref()) {
                    Correlation::Match => return Ok(response),
                    Correlation::Stale(stale) => {
                        warn!(
                            target: SESSION_TARGET,
                            server = %self.name,
                            expected = id,
                            stale,
                            "discarding late reply to an earlier request"
                        );
                    }
                    Correlation::Mismatch(received) => {
                        return Err(SessionError::ResponseIdMismatch {
                            expected: id,
                            received,
                        });
                    }
                },
                Message::Notification(notification) => {
                    debug!(
                        target: SESSION_TARGET,
                        server = %self.name,
                        method = %notification.method,
                        "skipping server notification"
                    );
                }
                Message::Request(request) => {
                    debug!(
                        target: SESSION_TARGET,
                        server = %self.name,
                        method = %request.method,
                        id = %request.id,
                        "skipping server request"
                    );
                }
            }
        }
    }

    fn writer(&mut self) -> Result<&mut (dyn Write + Send), SessionError> {
        match self.writer.as_deref_mut() {
            Some(writer) if !self.closed => Ok(writer),
            _ => Err(SessionError::Closed),
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// How a reply id relates to the outstanding request.
#[derive(Debug, PartialEq, Eq)]
enum Correlation {
    Match,
    /// A reply to a request this session already gave up on.
    Stale(i64),
    Mismatch(String),
}

impl Correlation {
    fn of(expected: i64, received: Option<&RequestId>) -> Self {
        match received {
            Some(RequestId::Number(id)) if *id == expected => Self::Match,
            Some(RequestId::Number(id)) if (1..expected).contains(id) => Self::Stale(*id),
            Some(other) => Self::Mismatch(other.to_string()),
            None => Self::Mismatch(String::from("null")),
        }
    }
}
