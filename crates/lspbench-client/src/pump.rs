//! Background frame reader.
//!
//! Reads are blocking, so the server's stdout is decoded on a dedicated
//! thread and handed over a channel. The session waits on the channel with a
//! deadline, which turns a silent server into a timeout instead of a stall.
//! The thread ends when the stream closes or a frame cannot be realigned.

use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{trace, warn};

use crate::codec;
use crate::error::CodecError;
use crate::jsonrpc::Message;

const PUMP_TARGET: &str = "lspbench_client::pump";

type Frame = Result<Message, CodecError>;

/// Why [`FramePump::next`] returned without a message.
#[derive(Debug)]
pub(crate) enum Wait {
    /// The deadline passed.
    TimedOut,
    /// The stream failed or closed.
    Codec(CodecError),
}

/// Receiving end of a frame reader thread.
pub(crate) struct FramePump {
    frames: Receiver<Frame>,
}

impl FramePump {
    /// Starts decoding `stream` on a background thread.
    pub(crate) fn start<R>(label: &str, stream: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let (sender, frames) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("{label}-frames"))
            .spawn(move || pump(BufReader::new(stream), &sender));
        if let Err(error) = spawned {
            // The sender was dropped with the closure, so reads report closure.
            warn!(target: PUMP_TARGET, %error, "failed to start frame reader");
        }
        Self { frames }
    }

    /// Waits up to `timeout` for the next decoded message.
    pub(crate) fn next(&self, timeout: Duration) -> Result<Message, Wait> {
        match self.frames.recv_timeout(timeout) {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(error)) => Err(Wait::Codec(error)),
            Err(RecvTimeoutError::Timeout) => Err(Wait::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(Wait::Codec(CodecError::TransportClosed)),
        }
    }
}

fn pump<R: BufRead>(mut reader: R, sender: &Sender<Frame>) {
    loop {
        let frame = codec::decode(&mut reader);
        let keep_reading = frame
            .as_ref()
            .map_or_else(CodecError::is_frame_intact, |_| true);
        if let Err(error) = &frame {
            trace!(target: PUMP_TARGET, %error, keep_reading, "frame decode failed");
        }
        if sender.send(frame).is_err() || !keep_reading {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::jsonrpc::Response;

    #[rstest]
    fn delivers_frames_in_order_then_reports_closure() {
        let mut input = codec::encode(&Response::success(1, json!(1))).expect("encode");
        input.extend(codec::encode(&Response::success(2, json!(2))).expect("encode"));
        let pump = FramePump::start("test", Cursor::new(input));

        let first = pump.next(Duration::from_secs(5)).expect("first frame");
        let second = pump.next(Duration::from_secs(5)).expect("second frame");
        let end = pump.next(Duration::from_secs(5));

        assert_eq!(first, Message::from(Response::success(1, json!(1))));
        assert_eq!(second, Message::from(Response::success(2, json!(2))));
        assert!(matches!(end, Err(Wait::Codec(CodecError::TransportClosed))));
    }

    #[rstest]
    fn oversized_frame_ends_the_reader() {
        let mut input = b"Content-Length: 1000000000000000\r\n\r\n".to_vec();
        input.extend(codec::encode(&Response::success(1, json!(1))).expect("encode"));
        let pump = FramePump::start("test", Cursor::new(input));

        let first = pump.next(Duration::from_secs(5));
        let after = pump.next(Duration::from_secs(5));

        assert!(matches!(
            first,
            Err(Wait::Codec(CodecError::FrameTooLarge { .. }))
        ));
        assert!(matches!(after, Err(Wait::Codec(CodecError::TransportClosed))));
    }

    #[rstest]
    fn silent_stream_times_out() {
        let (reader, _writer) = std::io::pipe().expect("create pipe");
        let pump = FramePump::start("test", reader);

        let result = pump.next(Duration::from_millis(20));

        assert!(matches!(result, Err(Wait::TimedOut)));
    }
}
