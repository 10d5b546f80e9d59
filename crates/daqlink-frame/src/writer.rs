use std::time::Duration;

use bytes::BytesMut;
use daqlink_schema::{encoded_len, Message};
use daqlink_transport::{Transport, TransportError};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to a [`Transport`].
///
/// Each frame is assembled in a reusable buffer and handed to the transport
/// as exactly one write followed by one flush.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Transport> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one message.
    ///
    /// With a `write_timeout` configured, an elapsed budget fails with
    /// `TransportError::Timeout`; the stream may then hold a partial frame
    /// and should be closed.
    pub async fn write_frame(&mut self, message: &Message) -> Result<()> {
        write_frame_with(&self.inner, &mut self.buf, &self.config, message).await
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn set_write_timeout(&mut self, write_timeout: Option<Duration>) {
        self.config.write_timeout = write_timeout;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Write one message to `transport` with default configuration.
pub async fn write_frame<T: Transport + ?Sized>(transport: &T, message: &Message) -> Result<()> {
    let mut buf = BytesMut::new();
    write_frame_with(transport, &mut buf, &FrameConfig::default(), message).await
}

async fn write_frame_with<T: Transport + ?Sized>(
    transport: &T,
    buf: &mut BytesMut,
    config: &FrameConfig,
    message: &Message,
) -> Result<()> {
    let size = encoded_len(message);
    if size > config.max_frame_size {
        return Err(FrameError::FrameTooLarge {
            target: transport.target(),
            operation: "write frame",
            size,
            max: config.max_frame_size,
        });
    }

    buf.clear();
    encode_frame(message, buf)?;

    let send = async {
        transport.write(&buf[..]).await?;
        transport.flush().await
    };
    match config.write_timeout {
        Some(after) => tokio::time::timeout(after, send).await.map_err(|_| {
            TransportError::Timeout {
                target: transport.target(),
                operation: "write frame",
                after,
            }
        })??,
        None => send.await?,
    }

    tracing::trace!(endpoint = %transport.target(), kind = message.kind(), size, "frame written");
    Ok(())
}
