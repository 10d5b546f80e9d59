use daqlink_frame::FrameError;
use daqlink_schema::ConfigurationError;
use daqlink_transport::TransportError;

/// Errors raised by the device protocol engine.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Start was requested without a usable configuration.
    #[error("cannot start acquisition: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A configuration arrived while an acquisition was running.
    #[error("configuration rejected while running (send stop first)")]
    ConfigurationWhileRunning,

    /// A framing or verification failure on the session stream.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The transport failed outside of a frame operation.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DeviceError {
    /// True for rejections that leave the session usable.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::ConfigurationWhileRunning
        )
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
