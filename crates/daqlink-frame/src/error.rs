use daqlink_schema::SchemaError;
use daqlink_transport::TransportError;

/// Errors that can occur while framing messages over a transport.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame length exceeds the configured maximum.
    #[error("frame too large on {target} during {operation} ({size} bytes, max {max})")]
    FrameTooLarge {
        target: String,
        operation: &'static str,
        size: usize,
        max: usize,
    },

    /// A length prefix of zero was received.
    #[error("zero-length frame on {target}")]
    ZeroLength { target: String },

    /// The peer closed the stream part way through a frame.
    #[error("truncated frame on {target} ({received} of {expected} bytes received before close)")]
    Truncated {
        target: String,
        expected: usize,
        received: usize,
    },

    /// The payload failed schema verification.
    #[error("malformed payload on {target}: {source}")]
    Malformed {
        target: String,
        source: SchemaError,
    },

    /// An encoded envelope does not fit the 32-bit length prefix.
    #[error("encoded payload of {size} bytes does not fit a 32-bit length prefix")]
    LengthOverflow { size: usize },

    /// The peer closed the stream cleanly between frames.
    #[error("connection closed by {target}")]
    ConnectionClosed { target: String },

    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// True for framing and verification failures. The stream cannot be
    /// resynchronized after one of these; close it.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. }
                | Self::ZeroLength { .. }
                | Self::Truncated { .. }
                | Self::Malformed { .. }
                | Self::LengthOverflow { .. }
        )
    }

    /// True when the stream ended at a frame boundary or was closed locally.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed { .. } => true,
            Self::Transport(err) => err.is_connection_closed(),
            _ => false,
        }
    }

    /// True when a bounded write ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
