//! Parsed protocol frames

use std::borrow::Cow;

use bytes::Bytes;
use tracing::field;

use crate::content_type::ContentType;
use crate::error::ReplyError;

/// Prefix of a reply that reports a failed command
const ERROR_PREFIX: &str = "-ERR ";

/// One frame received from the peer
///
/// Only the headers the client acts on are kept; everything else in the
/// header block is dropped by the codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// `Content-Type` header (empty if the peer omitted it)
    pub content_type: String,
    /// `Reply-Text` header
    pub reply_text: Option<String>,
    /// `Job-UUID` header
    pub job_uuid: Option<String>,
    /// Body, present only when a positive `Content-Length` was declared
    pub body: Option<Bytes>,
}

impl Response {
    /// Create a response with only a content type
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    /// Classified content type
    pub fn kind(&self) -> ContentType {
        ContentType::from_header(&self.content_type)
    }

    /// Reply text, or an empty string when absent
    pub fn text(&self) -> &str {
        self.reply_text.as_deref().unwrap_or_default()
    }

    /// Body bytes, or an empty slice when absent
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }

    /// Error carried by this frame, if any
    ///
    /// A disconnect notice maps to [`ReplyError::Disconnected`]. A command
    /// reply whose text, or an api response whose body, starts with `-ERR `
    /// maps to [`ReplyError::Command`] holding the rest of the text.
    pub fn as_err(&self) -> Option<ReplyError> {
        match self.kind() {
            ContentType::DisconnectNotice => Some(ReplyError::Disconnected),
            ContentType::CommandReply => command_error(self.text()),
            ContentType::ApiResponse => command_error(&self.body_text()),
            _ => None,
        }
    }

    /// Emit a trace record describing this frame
    pub fn log_received(&self) {
        let error = self.as_err();
        let length = match (&error, &self.body) {
            (None, Some(body)) if !body.is_empty() => Some(body.len()),
            _ => None,
        };

        tracing::trace!(
            r#type = %self.content_type,
            job_uuid = self.job_uuid.as_deref(),
            error = error.as_ref().map(field::display),
            length,
            "response"
        );
    }
}

fn command_error(text: &str) -> Option<ReplyError> {
    text.strip_prefix(ERROR_PREFIX)
        .map(|message| ReplyError::Command(message.to_string()))
}
