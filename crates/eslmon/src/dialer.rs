//! Connection establishment

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens the duplex byte stream a monitor runs over
///
/// The monitor applies the dial timeout and cancellation around `dial`.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// The stream type produced by this dialer
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Connect to `address` (`host:port`)
    async fn dial(&self, address: &str) -> std::io::Result<Self::Stream>;
}

/// Plain TCP dialer
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, address: &str) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect(address).await?;
        // commands are small and latency matters more than throughput
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
