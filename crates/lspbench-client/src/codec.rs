//! LSP header framing.
//!
//! Every message travels as:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//! Decoding reads header lines up to the blank terminator, then exactly
//! `<length>` body bytes. Nothing past the declared length is consumed, so
//! the next frame stays in the reader.

use std::io::{BufRead, Write};

use serde::Serialize;

use crate::error::CodecError;
use crate::jsonrpc::Message;

const CONTENT_LENGTH: &str = "content-length";

/// Largest body a single frame may declare.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Serialises `message` and prepends the `Content-Length` header.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the message cannot be serialised.
pub fn encode<T>(message: &T) -> Result<Vec<u8>, CodecError>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Encodes `message` and writes the whole frame, flushing afterwards.
///
/// # Errors
///
/// Returns [`CodecError::TransportClosed`] if the peer stopped reading and
/// [`CodecError::Io`] for other write failures.
pub fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: Write + ?Sized,
    T: Serialize + ?Sized,
{
    let frame = encode(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one framed message from `reader`.
///
/// # Errors
///
/// Returns [`CodecError::TransportClosed`] if the stream ends before a full
/// frame is available, header errors for malformed framing,
/// [`CodecError::FrameTooLarge`] when the declared length exceeds
/// [`MAX_FRAME_LEN`], and [`CodecError::Json`] when the body is not a
/// JSON-RPC message. A body error leaves the stream aligned on the next
/// frame.
pub fn decode<R>(reader: &mut R) -> Result<Message, CodecError>
where
    R: BufRead + ?Sized,
{
    let body = read_frame(reader)?;
    Ok(serde_json::from_slice(&body)?)
}

/// Reads one frame body without interpreting it.
///
/// # Errors
///
/// See [`decode`].
pub fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, CodecError>
where
    R: BufRead + ?Sized,
{
    let content_length = read_headers(reader)?;
    if content_length > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            length: content_length,
            limit: MAX_FRAME_LEN,
        });
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(body)
}

fn read_headers<R>(reader: &mut R) -> Result<usize, CodecError>
where
    R: BufRead + ?Sized,
{
    let mut content_length: Option<usize> = None;
    let mut seen_header = false;
    let mut raw = Vec::new();

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            return Err(CodecError::TransportClosed);
        }
        let line = String::from_utf8_lossy(&raw);
        let trimmed = line.trim_end_matches(['\r', '\n']);

        if trimmed.is_empty() {
            if seen_header {
                break;
            }
            // Stray blank lines between frames carry no header block.
            continue;
        }
        seen_header = true;

        if let Some(length) = parse_content_length(trimmed)? {
            content_length = Some(length);
        }
    }

    content_length.ok_or(CodecError::MissingContentLength)
}

/// Extracts the value of a `Content-Length` header, ignoring other headers.
fn parse_content_length(line: &str) -> Result<Option<usize>, CodecError> {
    let Some((key, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| CodecError::InvalidHeader {
            line: line.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Read};

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::jsonrpc::{Notification, Request, Response, ResponseError};

    #[rstest]
    fn encodes_exact_body_length() {
        let message = Request::new(1, "initialize", Some(json!({"rootPath": "/tmp/é"})));

        let frame = encode(&message).expect("encode");
        let text = String::from_utf8(frame).expect("utf8 frame");
        let (header, body) = text.split_once("\r\n\r\n").expect("header terminator");

        assert_eq!(header, format!("Content-Length: {}", body.len()));
        assert!(body.contains("é"));
    }

    #[rstest]
    #[case(Message::from(Request::new(7, "textDocument/hover", Some(json!({"position": {"line": 1, "character": 2}})))))]
    #[case(Message::from(Notification::new("exit", None)))]
    #[case(Message::from(Response::success(3, json!([{"uri": "file:///x"}]))))]
    #[case(Message::from(Response::success(4, serde_json::Value::Null)))]
    #[case(Message::from(Response::failure(5, ResponseError::new(-32601, "method not found"))))]
    fn decode_inverts_encode(#[case] message: Message) {
        let frame = encode(&message).expect("encode");

        let decoded = decode(&mut Cursor::new(frame)).expect("decode");

        assert_eq!(decoded, message);
    }

    #[rstest]
    #[case(b"Content-Length: 2\r\n\r\n{}".as_slice())]
    #[case(b"Content-Length: 2\n\n{}".as_slice())]
    #[case(b"content-length: 2\r\n\r\n{}".as_slice())]
    #[case(b"CONTENT-LENGTH:2\n\r\n{}".as_slice())]
    #[case(b"Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: 2\r\n\r\n{}".as_slice())]
    fn accepts_header_variants(#[case] input: &[u8]) {
        let body = read_frame(&mut Cursor::new(input)).expect("read frame");

        assert_eq!(body, b"{}");
    }

    #[rstest]
    fn stops_at_declared_length() {
        let input = b"Content-Length: 2\r\n\r\n{}Content-Length: 3\r\n\r\n[1]";
        let mut reader = BufReader::new(Cursor::new(input.as_slice()));

        let first = read_frame(&mut reader).expect("first frame");
        let second = read_frame(&mut reader).expect("second frame");
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).expect("drain");

        assert_eq!(first, b"{}");
        assert_eq!(second, b"[1]");
        assert!(rest.is_empty());
    }

    #[rstest]
    fn reports_missing_content_length() {
        let input = b"Content-Type: application/json\r\n\r\n{}";

        let result = read_frame(&mut Cursor::new(input.as_slice()));

        assert!(matches!(result, Err(CodecError::MissingContentLength)));
    }

    #[rstest]
    fn reports_invalid_content_length() {
        let input = b"Content-Length: lots\r\n\r\n{}";

        let result = read_frame(&mut Cursor::new(input.as_slice()));

        assert!(matches!(result, Err(CodecError::InvalidHeader { .. })));
    }

    #[rstest]
    fn rejects_oversized_content_length() {
        let input = b"Content-Length: 1000000000000000\r\n\r\n{}";

        let result = read_frame(&mut Cursor::new(input.as_slice()));

        assert!(matches!(
            result,
            Err(CodecError::FrameTooLarge {
                length: 1_000_000_000_000_000,
                limit: MAX_FRAME_LEN,
            })
        ));
        assert!(!result.as_ref().is_err_and(CodecError::is_frame_intact));
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"Content-Length: 10".as_slice())]
    #[case(b"Content-Length: 10\r\n\r\n{\"a\"".as_slice())]
    fn truncated_stream_is_transport_closed(#[case] input: &[u8]) {
        let result = read_frame(&mut Cursor::new(input));

        assert!(matches!(result, Err(CodecError::TransportClosed)));
    }

    #[rstest]
    fn malformed_body_leaves_next_frame_readable() {
        let input = b"Content-Length: 3\r\n\r\nnopContent-Length: 2\r\n\r\n{}";
        let mut reader = Cursor::new(input.as_slice());

        let first = decode(&mut reader);
        let second = read_frame(&mut reader).expect("second frame");

        assert!(first.as_ref().is_err_and(CodecError::is_frame_intact));
        assert_eq!(second, b"{}");
    }

    #[rstest]
    fn write_message_flushes_whole_frame() {
        let mut sink = Vec::new();

        write_message(&mut sink, &Notification::new("initialized", Some(json!({}))))
            .expect("write");

        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.starts_with("Content-Length: "));
        assert!(text.ends_with(r#""params":{}}"#));
    }
}
