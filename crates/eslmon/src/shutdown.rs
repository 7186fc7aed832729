//! Cancellation signal with a recorded cause
//!
//! [`Shutdown`] wraps a [`CancellationToken`] and remembers why it was
//! cancelled, so a run that ends because of cancellation can report the
//! cause instead of the I/O error the cancellation produced.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why a [`Shutdown`] was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelCause(Arc<str>);

impl CancelCause {
    /// Cause recorded by a plain [`Shutdown::cancel`]
    pub fn canceled() -> Self {
        Self::from("operation canceled")
    }

    /// Cause text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CancelCause {}

impl From<&str> for CancelCause {
    fn from(cause: &str) -> Self {
        Self(Arc::from(cause))
    }
}

impl From<String> for CancelCause {
    fn from(cause: String) -> Self {
        Self(Arc::from(cause))
    }
}

/// Outer cancellation signal for a monitor run
///
/// Clones share state: cancelling any clone cancels all of them. Only the
/// first cause is kept.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
}

impl Shutdown {
    /// Create a signal that has not fired
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with the default cause
    pub fn cancel(&self) {
        self.cancel_with(CancelCause::canceled());
    }

    /// Cancel, recording `cause` unless a cause was already recorded
    pub fn cancel_with(&self, cause: impl Into<CancelCause>) {
        // cause is set before the token fires so waiters always observe it
        let _ = self.cause.set(cause.into());
        self.token.cancel();
    }

    /// Cancel with `cause` once `after` has elapsed
    ///
    /// The timer task exits early if the signal fires for another reason.
    pub fn cancel_after(&self, after: Duration, cause: impl Into<CancelCause>) -> JoinHandle<()> {
        let shutdown = self.clone();
        let cause = cause.into();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.token.cancelled() => {}
                _ = tokio::time::sleep(after) => shutdown.cancel_with(cause),
            }
        })
    }

    /// Whether the signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal fires
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Recorded cause, `None` until the signal fires
    pub fn cause(&self) -> Option<CancelCause> {
        if !self.is_cancelled() {
            return None;
        }
        Some(self.cause.get().cloned().unwrap_or_else(CancelCause::canceled))
    }
}

impl From<CancellationToken> for Shutdown {
    fn from(token: CancellationToken) -> Self {
        Self {
            token,
            cause: Arc::default(),
        }
    }
}
