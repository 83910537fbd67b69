//! Error types for the protocol client.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while framing or parsing messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream ended before a complete frame was read, or the peer stopped
    /// accepting writes.
    #[error("transport closed before a complete frame was transferred")]
    TransportClosed,

    /// The header block carried no `Content-Length` entry.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// A `Content-Length` value could not be parsed.
    #[error("invalid header line: {line}")]
    InvalidHeader {
        /// The offending header line, without its terminator.
        line: String,
    },

    /// The declared body length exceeds the frame size limit.
    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Length announced by the `Content-Length` header.
        length: usize,
        /// Largest accepted body length.
        limit: usize,
    },

    /// Any other I/O failure on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The frame body is not a valid JSON-RPC message.
    #[error("malformed message body: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Returns true when the peer closed the stream.
    #[must_use]
    pub const fn is_transport_closed(&self) -> bool {
        matches!(self, Self::TransportClosed)
    }

    /// Returns true when the stream position is still aligned on a frame
    /// boundary, so reading may continue after this error.
    #[must_use]
    pub const fn is_frame_intact(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl From<io::Error> for CodecError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset => Self::TransportClosed,
            _ => Self::Io(error),
        }
    }
}

/// Errors raised while launching a server process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The language server binary was not found.
    #[error("language server binary not found: {command}")]
    BinaryNotFound {
        /// The command that was not found.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to spawn the language server process.
    #[error("failed to spawn language server process: {message}")]
    SpawnFailed {
        /// Description of the spawn failure.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A standard stream of the child could not be captured.
    #[error("failed to capture {stream} of the language server process")]
    PipeUnavailable {
        /// Name of the missing stream.
        stream: &'static str,
    },
}

/// Errors raised by a request or notification on a live session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Framing or transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] CodecError),

    /// No reply arrived within the configured request timeout.
    #[error("{method} timed out after {}ms", timeout.as_millis())]
    Timeout {
        /// Method of the request that timed out.
        method: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The reply carried an id other than the one just sent.
    #[error("response id mismatch: expected {expected}, received {received}")]
    ResponseIdMismatch {
        /// Identifier of the outstanding request.
        expected: i64,
        /// Identifier echoed by the server.
        received: String,
    },

    /// The session has already been shut down.
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Returns true when the session can carry no further traffic.
    #[must_use]
    pub const fn is_transport_closed(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_transport_closed(),
            Self::Closed => true,
            Self::Timeout { .. } | Self::ResponseIdMismatch { .. } => false,
        }
    }

    /// Returns true when the server broke the request/response contract.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ResponseIdMismatch { .. })
    }
}
