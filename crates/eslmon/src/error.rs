//! Monitor error types

use std::path::PathBuf;
use std::time::Duration;

use esl_protocol::{ProtocolError, ReplyError};
use thiserror::Error;

use crate::shutdown::CancelCause;

/// Reason a monitor run ended
///
/// Each variant names the phase that failed. A run never ends without one.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Connecting to the peer failed
    #[error("dialer: {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting to the peer took longer than the dial timeout
    #[error("dialer: {address}: timed out after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },

    /// Authentication handshake failed
    #[error("authenticate: {0}")]
    Authenticate(#[source] CommandError),

    /// Sending the subscription command failed
    #[error("subscribe: {0}")]
    Subscribe(#[source] CommandError),

    /// The peer rejected the subscription command
    #[error("subscribe response: {0}")]
    SubscribeRejected(#[source] ReplyError),

    /// Reading a frame failed while streaming events
    #[error("read: {0}")]
    Read(#[source] ProtocolError),

    /// An event body could not be decoded
    #[error("event parse: {0}")]
    EventDecode(#[source] ProtocolError),

    /// The peer sent a disconnect notice
    #[error("server closed: end of stream")]
    ServerClosed,

    /// The run was cancelled by the caller
    #[error("done: {0}")]
    Cancelled(CancelCause),
}

impl MonitorError {
    /// Cancellation cause, if the run ended because it was cancelled
    ///
    /// Covers cancellation while streaming as well as during the
    /// authentication and subscription exchanges.
    pub fn cancel_cause(&self) -> Option<&CancelCause> {
        match self {
            Self::Cancelled(cause) => Some(cause),
            Self::Authenticate(CommandError::Cancelled(cause))
            | Self::Subscribe(CommandError::Cancelled(cause)) => Some(cause),
            _ => None,
        }
    }

    /// Whether the run ended because it was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel_cause().is_some()
    }
}

/// Failure of one bounded command exchange (handshake or subscription)
#[derive(Error, Debug)]
pub enum CommandError {
    /// No reply within the command timeout
    #[error("timeout")]
    Timeout,

    /// Cancelled before a reply arrived
    #[error("{0}")]
    Cancelled(CancelCause),

    /// The peer refused the connection before authentication
    #[error("access denied")]
    AccessDenied,

    /// The peer rejected the shared secret
    #[error("invalid password")]
    InvalidPassword,

    /// The peer disconnected during the exchange
    #[error("server disconnected: end of stream")]
    ServerDisconnected,

    /// A frame of the wrong type arrived
    #[error("unexpected {phase} content type: {content_type:?}")]
    UnexpectedContentType {
        phase: &'static str,
        content_type: String,
    },

    /// Writing the command failed
    #[error("send: {0}")]
    Write(#[source] ProtocolError),

    /// Reading the reply failed
    #[error("read: {0}")]
    Read(#[source] ProtocolError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Peer address cannot be used
    #[error("bad address {address:?}: {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },

    /// Subscriber channel has no receiver
    #[error("subscriber channel is closed")]
    ClosedChannel,

    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
