use bytes::BytesMut;
use daqlink_schema::{decode_message, Message};
use daqlink_transport::Transport;

use crate::codec::{read_exact, FrameConfig, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete, verified messages from a [`Transport`].
///
/// Handles partial reads internally; callers always get complete frames.
/// The payload buffer is reused across frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Transport> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete message.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the peer closes the
    /// stream between frames, and `Err(FrameError::Truncated)` when it closes
    /// part way through one.
    pub async fn read_frame(&mut self) -> Result<Message> {
        read_frame_with(&self.inner, &mut self.buf, self.config.max_frame_size).await
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum frame size for subsequent reads.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Read one message from `transport` with a throwaway buffer.
pub async fn read_frame<T: Transport + ?Sized>(
    transport: &T,
    max_frame_size: usize,
) -> Result<Message> {
    let mut buf = BytesMut::new();
    read_frame_with(transport, &mut buf, max_frame_size).await
}

async fn read_frame_with<T: Transport + ?Sized>(
    transport: &T,
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> Result<Message> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let received = read_exact(transport, &mut prefix).await?;
    if received == 0 {
        return Err(FrameError::ConnectionClosed {
            target: transport.target(),
        });
    }
    if received < LENGTH_PREFIX_SIZE {
        return Err(FrameError::Truncated {
            target: transport.target(),
            expected: LENGTH_PREFIX_SIZE,
            received,
        });
    }

    let len = u32::from_le_bytes(prefix) as usize;
    if len == 0 {
        return Err(FrameError::ZeroLength {
            target: transport.target(),
        });
    }
    // Checked before the payload is buffered.
    if len > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            target: transport.target(),
            operation: "read frame",
            size: len,
            max: max_frame_size,
        });
    }

    buf.clear();
    buf.resize(len, 0);
    let received = read_exact(transport, &mut buf[..]).await?;
    if received < len {
        return Err(FrameError::Truncated {
            target: transport.target(),
            expected: LENGTH_PREFIX_SIZE + len,
            received: LENGTH_PREFIX_SIZE + received,
        });
    }

    let message = decode_message(&buf[..]).map_err(|source| FrameError::Malformed {
        target: transport.target(),
        source,
    })?;
    tracing::trace!(endpoint = %transport.target(), kind = message.kind(), len, "frame read");
    Ok(message)
}
