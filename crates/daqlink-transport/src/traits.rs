use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// The capability interface every byte-stream endpoint offers.
///
/// Implementations must tolerate one `read` and one `write`/`flush` in flight
/// at the same time (full duplex), and must reject a second concurrent
/// operation in the same direction rather than interleave bytes.
///
/// All methods take `&self` so that one instance can be shared (via `Arc`)
/// between an inbound and an outbound task.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the underlying OS channel, bounded by `deadline`.
    ///
    /// Refused or missing endpoints fail with `TransportError::Connect`; an
    /// elapsed deadline fails with `TransportError::Timeout`. No retry.
    async fn connect(&self, deadline: Duration) -> Result<()>;

    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed the stream.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `buf`, looping over partial OS writes.
    async fn write(&self, buf: &[u8]) -> Result<()>;

    /// Push buffered bytes to the peer.
    async fn flush(&self) -> Result<()>;

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Human-readable endpoint description, e.g. `"TCP Socket: localhost:1234"`.
    fn description(&self) -> String;

    /// Endpoint identity used in error messages: the pipe name or `host:port`.
    fn target(&self) -> String;

    /// Release the OS channel. Idempotent; never fails. In-flight reads and
    /// writes on other tasks fail with `TransportError::ConnectionClosed`.
    async fn dispose(&self);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(&self, deadline: Duration) -> Result<()> {
        (**self).connect(deadline).await
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf).await
    }

    async fn write(&self, buf: &[u8]) -> Result<()> {
        (**self).write(buf).await
    }

    async fn flush(&self) -> Result<()> {
        (**self).flush().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn description(&self) -> String {
        (**self).description()
    }

    fn target(&self) -> String {
        (**self).target()
    }

    async fn dispose(&self) {
        (**self).dispose().await
    }
}
