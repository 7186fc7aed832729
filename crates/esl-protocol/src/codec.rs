//! Tokio codec for the line-framed event socket protocol
//!
//! Inbound frames are a header block of `Name: value` lines closed by a
//! blank line, then `Content-Length` bytes of body when that header is
//! present. Outbound commands are a line of text closed by a blank line.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::response::Response;

/// Maximum length of one header line, excluding the line ending
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum declared body size (64MB)
pub const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Written after every command
const COMMAND_TERMINATOR: &[u8] = b"\n\n";

/// Codec for decoding frames and encoding commands
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Frame being assembled; `Some` once its first header line was read
    pending: Option<Response>,
    /// `Content-Length` seen in the current header block
    content_length: usize,
    /// Body length still to be read once the header block is complete
    body_length: Option<usize>,
}

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self::default()
    }

    fn take_frame(&mut self) -> Response {
        self.body_length = None;
        self.content_length = 0;
        self.pending.take().unwrap_or_default()
    }
}

impl Decoder for FrameCodec {
    type Item = Response;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if let Some(length) = self.body_length {
                if src.len() < length {
                    src.reserve(length - src.len());
                    return Ok(None);
                }

                let body = src.split_to(length).freeze();
                let mut frame = self.take_frame();
                frame.body = Some(body);
                return Ok(Some(frame));
            }

            let Some(newline) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_LINE_LENGTH {
                    return Err(ProtocolError::LineTooLong {
                        max: MAX_LINE_LENGTH,
                    });
                }
                return Ok(None); // Need more data
            };

            let raw = src.split_to(newline + 1);
            let line = trim_line_ending(&raw);
            if line.len() > MAX_LINE_LENGTH {
                return Err(ProtocolError::LineTooLong {
                    max: MAX_LINE_LENGTH,
                });
            }

            if line.is_empty() {
                if self.pending.is_none() {
                    continue; // keep-alive before any header
                }

                if self.content_length == 0 {
                    return Ok(Some(self.take_frame()));
                }

                self.body_length = Some(self.content_length);
                continue;
            }

            let frame = self.pending.get_or_insert_with(Response::default);
            apply_header(frame, &mut self.content_length, line)?;
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        if let Some(expected) = self.body_length {
            return Err(ProtocolError::IncompleteBody {
                expected,
                actual: buf.len(),
            });
        }

        if self.pending.is_some() || !buf.is_empty() {
            return Err(ProtocolError::IncompleteHeader);
        }

        Ok(None)
    }
}

impl<'a> Encoder<&'a str> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, command: &'a str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if command.is_empty() {
            return Ok(());
        }

        dst.reserve(command.len() + COMMAND_TERMINATOR.len());
        dst.put_slice(command.as_bytes());
        dst.put_slice(COMMAND_TERMINATOR);
        Ok(())
    }
}

/// Parse one header line into the frame being assembled
fn apply_header(
    frame: &mut Response,
    content_length: &mut usize,
    line: &[u8],
) -> Result<(), ProtocolError> {
    let idx = match line.iter().position(|b| *b == b':') {
        Some(idx) if idx > 0 => idx,
        _ => {
            return Err(ProtocolError::MalformedHeader(
                String::from_utf8_lossy(line).into_owned(),
            ))
        }
    };

    let value = trim_start(&line[idx + 1..]);
    match &line[..idx] {
        b"Content-Type" => frame.content_type = lossy(value),
        b"Reply-Text" => frame.reply_text = Some(lossy(value)),
        b"Job-UUID" => frame.job_uuid = Some(lossy(value)),
        b"Content-Length" => {
            let length = std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| ProtocolError::InvalidContentLength(lossy(value)))?;
            // zero or negative means no body
            let length = usize::try_from(length.max(0)).unwrap_or(usize::MAX);
            if length > MAX_BODY_SIZE {
                return Err(ProtocolError::BodyTooLarge {
                    size: length,
                    max: MAX_BODY_SIZE,
                });
            }
            *content_length = length;
        }
        _ => {} // not used by the client
    }

    Ok(())
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn trim_start(value: &[u8]) -> &[u8] {
    let start = value
        .iter()
        .position(|b| *b != b' ' && *b != b'\t')
        .unwrap_or(value.len());
    &value[start..]
}

fn lossy(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}
