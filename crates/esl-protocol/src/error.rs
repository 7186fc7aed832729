//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or decoding protocol messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Header line without a `name: value` delimiter
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// `Content-Length` header that is not a non-negative integer
    #[error("malformed content-length: {0:?}")]
    InvalidContentLength(String),

    /// Header line longer than the codec accepts
    #[error("header line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// Declared body exceeds the maximum size
    #[error("body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    /// Stream ended before the declared body was read
    #[error("incomplete body: expected {expected} bytes, got {actual}")]
    IncompleteBody { expected: usize, actual: usize },

    /// Stream ended inside a header block
    #[error("incomplete header block")]
    IncompleteHeader,

    /// Peer closed the stream between frames
    #[error("connection closed")]
    Closed,

    /// Event body is not a flat JSON object of strings
    #[error("parse event: {0}")]
    EventDecode(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error carried by a reply frame
///
/// Produced by [`Response::as_err`](crate::Response::as_err).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// The peer announced it is closing the connection
    #[error("end of stream")]
    Disconnected,

    /// The peer rejected a command; holds the text after `-ERR `
    #[error("{0}")]
    Command(String),
}
