use std::time::Duration;

use bytes::{BufMut, BytesMut};
use daqlink_schema::{encode_message, encoded_len, Message};
use daqlink_transport::Transport;

use crate::error::{FrameError, Result};

/// Length prefix: 4-byte little-endian unsigned.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame payload: 1 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Encode one message into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────────┐
/// │ Length (4B)  │ Payload                      │
/// │ u32 LE       │ (Length bytes, one envelope) │
/// └──────────────┴──────────────────────────────┘
/// ```
///
/// Returns the payload length.
pub fn encode_frame(message: &Message, dst: &mut BytesMut) -> Result<usize> {
    let len = encoded_len(message);
    let prefix = u32::try_from(len).map_err(|_| FrameError::LengthOverflow { size: len })?;
    dst.reserve(LENGTH_PREFIX_SIZE + len);
    dst.put_u32_le(prefix);
    encode_message(message, dst);
    Ok(len)
}

/// Fill `buf` from `transport`, accumulating partial reads.
///
/// Returns the number of bytes read, which is less than `buf.len()` only
/// when the peer closed the stream first. Never retries past a close.
pub async fn read_exact<T: Transport + ?Sized>(
    transport: &T,
    buf: &mut [u8],
) -> daqlink_transport::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let read = transport.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_frame_size: usize,
    /// Budget for one complete frame write (write + flush). `None` waits
    /// indefinitely.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use daqlink_schema::{CommandCode, Configuration, Measurement};

    #[test]
    fn encode_prefixes_exact_length() {
        let message = Message::from(Measurement::new(vec![1.0, 2.0]));
        let mut buf = BytesMut::new();
        let len = encode_frame(&message, &mut buf).unwrap();

        assert_eq!(len, encoded_len(&message));
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + len);
        assert_eq!(&buf[..4], &(len as u32).to_le_bytes());
    }

    #[test]
    fn encode_appends_consecutive_frames() {
        let mut buf = BytesMut::new();
        let a = encode_frame(&Message::from(CommandCode::Start), &mut buf).unwrap();
        let b = encode_frame(&Message::from(Configuration::new(10, 4)), &mut buf).unwrap();
        assert_eq!(buf.len(), 2 * LENGTH_PREFIX_SIZE + a + b);
    }

    #[tokio::test]
    async fn read_exact_accumulates_partial_reads() {
        let transport = ScriptedTransport::chunks(vec![vec![1], vec![2, 3], vec![4, 5, 6]]);
        let mut buf = [0u8; 6];
        let filled = read_exact(&transport, &mut buf).await.unwrap();
        assert_eq!(filled, 6);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn read_exact_stops_at_close() {
        let transport = ScriptedTransport::chunks(vec![vec![1, 2]]);
        let mut buf = [0u8; 4];
        let filled = read_exact(&transport, &mut buf).await.unwrap();
        assert_eq!(filled, 2);
    }

    #[tokio::test]
    async fn read_exact_empty_buffer_does_not_read() {
        let transport = ScriptedTransport::chunks(vec![]);
        let filled = read_exact(&transport, &mut []).await.unwrap();
        assert_eq!(filled, 0);
        assert_eq!(transport.read_calls(), 0);
    }

    #[test]
    fn default_config() {
        let config = FrameConfig::default();
        assert_eq!(config.max_frame_size, 1024 * 1024);
        assert!(config.write_timeout.is_none());
    }
}
