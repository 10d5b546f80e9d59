use daqlink_frame::FrameError;
use daqlink_schema::ConfigurationError;
use daqlink_transport::TransportError;

/// Errors that can occur in host operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host was built without a transport.
    #[error("a transport is required to build a host")]
    MissingTransport,

    /// Sampling parameters were rejected before anything was sent.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The measurement stream has already been handed out.
    #[error("the measurement stream for this connection was already taken")]
    StreamTaken,

    /// Frame-level error.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Transport-level error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HostError {
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Frame(err) if err.is_protocol_error())
    }

    /// True when the connection was closed, by the peer or locally.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::Frame(err) => err.is_connection_closed(),
            Self::Transport(err) => err.is_connection_closed(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Frame(err) => err.is_timeout(),
            Self::Transport(err) => err.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
