//! Blocking language server protocol client.
//!
//! The crate speaks the standard LSP transport to one server at a time:
//! [`codec`] frames JSON-RPC [`jsonrpc`] messages, [`supervisor`] owns the
//! server process, and [`ServerSession`] correlates each request with its
//! reply under a read timeout. Memory sampling sits behind the
//! [`MemoryProbe`] trait so callers never branch on the platform.

pub mod codec;
mod error;
pub mod jsonrpc;
pub mod memory;
mod pump;
mod session;
pub mod supervisor;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{CodecError, SessionError, SupervisorError};
pub use jsonrpc::{Message, Notification, Request, RequestId, Response, ResponseError};
pub use memory::{MemoryProbe, MemoryReading};
pub use session::{ServerSession, SessionOptions};
pub use supervisor::{ServerCommand, Termination};

#[cfg(test)]
mod tests;
