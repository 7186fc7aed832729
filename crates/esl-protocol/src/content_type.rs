//! Content types carried in the `Content-Type` header

use std::fmt;

/// Content type of a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Reply to a plain command (`auth`, `event`, ...)
    CommandReply,
    /// Reply to an `api` command; the result is in the body
    ApiResponse,
    /// Unsolicited request for credentials sent on connect
    AuthRequest,
    /// Event with a JSON object body
    EventPlain,
    /// Event in the JSON encoding (recognized, not decoded)
    EventJson,
    /// Event in the XML encoding (recognized, not decoded)
    EventXml,
    /// Peer is about to close the connection
    DisconnectNotice,
    /// Peer refused the connection before authentication
    RudeRejection,
    /// Anything else, including a missing header
    Unknown,
}

impl ContentType {
    /// Header value for this content type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandReply => "command/reply",
            Self::ApiResponse => "api/response",
            Self::AuthRequest => "auth/request",
            Self::EventPlain => "text/event-plain",
            Self::EventJson => "text/event-json",
            Self::EventXml => "text/event-xml",
            Self::DisconnectNotice => "text/disconnect-notice",
            Self::RudeRejection => "text/rude-rejection",
            Self::Unknown => "",
        }
    }

    /// Classify a `Content-Type` header value
    pub fn from_header(value: &str) -> Self {
        match value {
            "command/reply" => Self::CommandReply,
            "api/response" => Self::ApiResponse,
            "auth/request" => Self::AuthRequest,
            "text/event-plain" => Self::EventPlain,
            "text/event-json" => Self::EventJson,
            "text/event-xml" => Self::EventXml,
            "text/disconnect-notice" => Self::DisconnectNotice,
            "text/rude-rejection" => Self::RudeRejection,
            _ => Self::Unknown,
        }
    }

    /// Whether frames of this type carry an event
    pub fn is_event(&self) -> bool {
        matches!(self, Self::EventPlain | Self::EventJson | Self::EventXml)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
