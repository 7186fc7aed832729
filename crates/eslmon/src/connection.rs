//! Frame transport over a duplex byte stream

use esl_protocol::{FrameCodec, ProtocolError, Response};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::CommandError;

/// Event socket connection
///
/// Writes go through a lock so concurrent writers never interleave the
/// bytes of two commands. Reads need `&mut self`: there is one reader.
pub struct Connection<S> {
    reader: FramedRead<ReadHalf<S>, FrameCodec>,
    writer: Mutex<FramedWrite<WriteHalf<S>, FrameCodec>>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Wrap a connected stream
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: FramedRead::new(read_half, FrameCodec::new()),
            writer: Mutex::new(FramedWrite::new(write_half, FrameCodec::new())),
        }
    }

    /// Write one command and flush it; an empty command is not sent
    pub async fn write(&self, command: &str) -> Result<(), ProtocolError> {
        if command.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock().await;
        writer.send(command).await
    }

    /// Read the next frame
    ///
    /// Returns [`ProtocolError::Closed`] when the peer closed the stream
    /// cleanly between frames.
    pub async fn read(&mut self) -> Result<Response, ProtocolError> {
        match self.reader.next().await {
            Some(Ok(response)) => {
                response.log_received();
                Ok(response)
            }
            Some(Err(err)) => Err(err),
            None => Err(ProtocolError::Closed),
        }
    }

    /// Write a command and read the frame that follows it
    pub async fn send(&mut self, command: &str) -> Result<Response, CommandError> {
        self.write(command).await.map_err(CommandError::Write)?;
        self.read().await.map_err(CommandError::Read)
    }
}
