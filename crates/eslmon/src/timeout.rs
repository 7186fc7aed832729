//! Bounded command exchanges
//!
//! Handshake and subscription race their exchange against the outer
//! [`Shutdown`] signal and a per-command timer. Whichever finishes first
//! decides the result.
//!
//! The losing exchange is dropped mid-flight. A read that was in progress is
//! abandoned with whatever bytes it had buffered, which leaves the
//! connection out of sync; callers treat every error from here as fatal and
//! drop the connection.

use std::future::Future;
use std::time::Duration;

use crate::error::CommandError;
use crate::shutdown::{CancelCause, Shutdown};

/// Run `operation`, bounded by `shutdown` and an optional `timeout`
///
/// Returns [`CommandError::Cancelled`] with the recorded cause if the
/// signal fires first, [`CommandError::Timeout`] if the timer fires first,
/// else the operation's own result. A `None` timeout leaves only the signal.
pub async fn with_timeout<F, T>(
    shutdown: &Shutdown,
    timeout: Option<Duration>,
    operation: F,
) -> Result<T, CommandError>
where
    F: Future<Output = Result<T, CommandError>>,
{
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            let cause = shutdown.cause().unwrap_or_else(CancelCause::canceled);
            Err(CommandError::Cancelled(cause))
        }
        result = operation => result,
        _ = deadline => Err(CommandError::Timeout),
    }
}
