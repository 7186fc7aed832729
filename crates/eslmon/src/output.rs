//! JSON-lines event output

use std::io;

use esl_protocol::Event;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::shutdown::Shutdown;

/// Cancellation cause recorded when the output stops
pub const OUTPUT_CLOSED: &str = "output closed";

/// Write every received event to `out` as one JSON object per line
///
/// Runs until the channel closes or a write fails. Either way `shutdown`
/// is cancelled before the receiver is dropped, so a run feeding this
/// channel stops instead of streaming into a closed subscriber.
pub async fn write_events<W>(
    mut rx: mpsc::Receiver<Event>,
    mut out: W,
    shutdown: &Shutdown,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let result = copy_events(&mut rx, &mut out).await;
    if let Err(err) = &result {
        tracing::warn!(error = %err, "event output failed");
    }
    shutdown.cancel_with(OUTPUT_CLOSED);
    result
}

async fn copy_events<W>(rx: &mut mpsc::Receiver<Event>, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    Ok(())
}
