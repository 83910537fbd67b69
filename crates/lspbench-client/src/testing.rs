//! Scripted in-process language server for tests.
//!
//! [`FakeServer`] answers requests from a canned-response table on a
//! background thread connected to a [`ServerSession`] through OS pipes. It
//! never interprets parameters; every reply is chosen by method name alone,
//! which keeps runs deterministic.

use std::collections::HashMap;
use std::io::{self, BufReader, PipeReader, PipeWriter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{Value, json};

use crate::codec;
use crate::jsonrpc::{Message, Notification, Request, RequestId, Response, ResponseError};
use crate::memory::{MemoryProbe, MemoryReading};
use crate::session::{ServerSession, SessionOptions};

/// What the fake server does when a request arrives.
#[derive(Debug, Clone)]
enum Reply {
    Result(Value),
    Error(ResponseError),
    /// Never answers.
    Silent,
    /// Closes the connection instead of answering.
    HangUp,
    /// Answers with an id the client never issued.
    WrongId,
}

#[derive(Debug, Clone)]
struct Script {
    reply: Reply,
    delay: Duration,
    notify_before: Vec<String>,
    stale_reply_before: bool,
}

impl Script {
    const fn new(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            notify_before: Vec::new(),
            stale_reply_before: false,
        }
    }
}

/// Builder for a scripted server.
#[derive(Debug, Clone)]
pub struct FakeServer {
    scripts: HashMap<String, Script>,
    memory: MemoryReading,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    /// Creates a server that answers `initialize` with empty capabilities
    /// and every other request with `null`.
    #[must_use]
    pub fn new() -> Self {
        let mut scripts = HashMap::new();
        scripts.insert(
            String::from("initialize"),
            Script::new(Reply::Result(json!({"capabilities": {}}))),
        );
        Self {
            scripts,
            memory: MemoryReading::Unavailable,
        }
    }

    /// Answers `method` with `result`.
    #[must_use]
    pub fn respond(self, method: &str, result: Value) -> Self {
        self.reply_with(method, Reply::Result(result))
    }

    /// Answers `method` with a JSON-RPC error object.
    #[must_use]
    pub fn fail(self, method: &str, code: i64, message: &str) -> Self {
        self.reply_with(method, Reply::Error(ResponseError::new(code, message)))
    }

    /// Leaves `method` unanswered.
    #[must_use]
    pub fn silent(self, method: &str) -> Self {
        self.reply_with(method, Reply::Silent)
    }

    /// Closes the connection when `method` arrives.
    #[must_use]
    pub fn hang_up_on(self, method: &str) -> Self {
        self.reply_with(method, Reply::HangUp)
    }

    /// Answers `method` with an id that was never issued.
    #[must_use]
    pub fn wrong_id(self, method: &str) -> Self {
        self.reply_with(method, Reply::WrongId)
    }

    /// Waits `delay` before answering `method`.
    #[must_use]
    pub fn delay(mut self, method: &str, delay: Duration) -> Self {
        self.script(method).delay = delay;
        self
    }

    /// Emits a `notification` before answering `method`.
    #[must_use]
    pub fn notify_before(mut self, method: &str, notification: &str) -> Self {
        self.script(method).notify_before.push(notification.to_owned());
        self
    }

    /// Emits a reply to the previous request id before answering `method`.
    #[must_use]
    pub fn stale_reply_before(mut self, method: &str) -> Self {
        self.script(method).stale_reply_before = true;
        self
    }

    /// Reports a fixed resident memory size while the server is running.
    #[must_use]
    pub const fn reporting_memory(mut self, megabytes: f64) -> Self {
        self.memory = MemoryReading::Megabytes(megabytes);
        self
    }

    /// Starts the server thread and opens a session connected to it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the pipes or the thread cannot be created.
    pub fn connect(
        self,
        name: &str,
        options: SessionOptions,
    ) -> io::Result<(ServerSession, FakeServerHandle)> {
        let (client_reader, server_writer) = io::pipe()?;
        let (server_reader, client_writer) = io::pipe()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let probe = FakeMemory {
            reading: self.memory,
            alive: Arc::clone(&alive),
        };

        let log = Arc::clone(&received);
        let thread = thread::Builder::new()
            .name(format!("fake-{name}"))
            .spawn(move || {
                self.serve(server_reader, server_writer, &log);
                alive.store(false, Ordering::SeqCst);
            })?;

        let session = ServerSession::from_streams(name, client_reader, client_writer, options)
            .with_memory_probe(Box::new(probe));
        Ok((
            session,
            FakeServerHandle {
                received,
                thread: Some(thread),
            },
        ))
    }

    fn reply_with(mut self, method: &str, reply: Reply) -> Self {
        self.script(method).reply = reply;
        self
    }

    fn script(&mut self, method: &str) -> &mut Script {
        self.scripts
            .entry(method.to_owned())
            .or_insert_with(|| Script::new(Reply::Result(Value::Null)))
    }

    fn serve(&self, reader: PipeReader, mut writer: PipeWriter, log: &Mutex<Vec<Message>>) {
        let mut reader = BufReader::new(reader);
        while let Ok(message) = codec::decode(&mut reader) {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.clone());
            let keep_serving = match message {
                Message::Request(request) => self.answer(&request, &mut writer),
                Message::Notification(notification) => notification.method != "exit",
                Message::Response(_) => true,
            };
            if !keep_serving {
                break;
            }
        }
    }

    fn answer(&self, request: &Request, writer: &mut PipeWriter) -> bool {
        let fallback = Script::new(Reply::Result(Value::Null));
        let script = self.scripts.get(&request.method).unwrap_or(&fallback);
        let RequestId::Number(id) = request.id else {
            return true;
        };

        thread::sleep(script.delay);
        let mut preface: Vec<Message> = script
            .notify_before
            .iter()
            .map(|method| Notification::new(method.as_str(), Some(json!({}))).into())
            .collect();
        if script.stale_reply_before {
            preface.push(Response::success(id - 1, Value::Null).into());
        }
        for message in &preface {
            if codec::write_message(writer, message).is_err() {
                return false;
            }
        }

        let response = match &script.reply {
            Reply::Result(result) => Response::success(id, result.clone()),
            Reply::Error(error) => Response::failure(id, error.clone()),
            Reply::WrongId => Response::success(id + 100, Value::Null),
            Reply::Silent => return true,
            Reply::HangUp => return false,
        };
        codec::write_message(writer, &response).is_ok()
    }
}

/// Reports a fixed reading until the fake server stops.
struct FakeMemory {
    reading: MemoryReading,
    alive: Arc<AtomicBool>,
}

impl MemoryProbe for FakeMemory {
    fn sample(&self, _pid: Option<u32>) -> MemoryReading {
        if self.alive.load(Ordering::SeqCst) {
            self.reading
        } else {
            MemoryReading::Unavailable
        }
    }
}

/// Observes a running [`FakeServer`].
#[derive(Debug)]
pub struct FakeServerHandle {
    received: Arc<Mutex<Vec<Message>>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeServerHandle {
    /// Messages received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<Message> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Method names received so far, in arrival order.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|message| match message {
                Message::Request(request) => Some(request.method),
                Message::Notification(notification) => Some(notification.method),
                Message::Response(_) => None,
            })
            .collect()
    }

    /// Ids of the requests received so far.
    #[must_use]
    pub fn request_ids(&self) -> Vec<RequestId> {
        self.received()
            .into_iter()
            .filter_map(|message| match message {
                Message::Request(request) => Some(request.id),
                Message::Notification(_) | Message::Response(_) => None,
            })
            .collect()
    }

    /// Waits for the server thread to finish.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            // A panicking fake server already failed the test through its
            // missing replies.
            drop(thread.join());
        }
    }
}
