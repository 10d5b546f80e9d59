/// Errors raised while decoding or verifying a schema-encoded envelope.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The bytes do not decode against the message schema.
    #[error("payload does not match the message schema: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The envelope has no message variant populated.
    #[error("envelope carries no message")]
    EmptyEnvelope,

    /// The envelope has more than one message variant populated.
    #[error("envelope carries {count} message variants (expected exactly one)")]
    MultiplePayloads { count: u32 },

    /// A command carries a code outside `CommandCode`.
    #[error("unknown command code {0}")]
    UnknownCommandCode(i32),

    /// A field uses a wire type the schema never produces.
    #[error("unsupported wire type {wire_type:?} for field {tag}")]
    UnsupportedWireType {
        tag: u32,
        wire_type: prost::encoding::WireType,
    },
}

/// Sampling parameters that cannot start an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("measurements_per_second must be greater than zero")]
    ZeroRate,

    #[error("samples_per_measurement must be greater than zero")]
    ZeroSamples,

    #[error("measurements_per_second must not exceed {max}")]
    RateTooHigh { max: u32 },

    #[error(
        "samples_per_measurement {samples} needs {frame_size}-byte frames (max {max_frame_size})"
    )]
    TooManySamples {
        samples: u32,
        frame_size: usize,
        max_frame_size: usize,
    },

    #[error("no configuration has been received")]
    Missing,
}

pub type Result<T> = std::result::Result<T, SchemaError>;
