use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in transport operations.
///
/// Every variant that concerns a live endpoint carries the endpoint identity
/// (`target`: the pipe name or `host:port`) and, where relevant, the
/// operation that failed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote endpoint refused the connection or does not exist.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// The deadline elapsed before the operation resolved.
    #[error("{operation} on {target} timed out after {after:?}")]
    Timeout {
        target: String,
        operation: &'static str,
        after: Duration,
    },

    /// The operation requires a connected transport.
    #[error("{operation} on {target}: not connected")]
    NotConnected {
        target: String,
        operation: &'static str,
    },

    /// The connection was closed (by the peer, or by `dispose`) while the
    /// operation was in flight.
    #[error("{operation} on {target}: connection closed")]
    ConnectionClosed {
        target: String,
        operation: &'static str,
    },

    /// Another operation in the same direction is already in flight.
    #[error("{operation} on {target}: another {operation} is already in flight")]
    Busy {
        target: String,
        operation: &'static str,
    },

    /// `connect` was called on a transport that is already connected.
    #[error("connect to {target}: already connected")]
    AlreadyConnected { target: String },

    /// `dispose` was called while `connect` was in progress.
    #[error("connect to {target}: cancelled")]
    Cancelled { target: String },

    /// An I/O error occurred on an established stream.
    #[error("{operation} on {target}: {source}")]
    Io {
        target: String,
        operation: &'static str,
        source: std::io::Error,
    },

    /// Failed to bind the device-side listener.
    #[error("failed to bind {target}: {source}")]
    Bind {
        target: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection on {target}: {source}")]
    Accept {
        target: String,
        source: std::io::Error,
    },

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The configured connection type is not one of the supported variants.
    #[error("unknown connection type {0:?} (expected \"named-pipe\" or \"tcp-socket\")")]
    UnknownConnectionKind(String),

    /// The transport configuration file could not be read or parsed.
    #[error("invalid transport configuration {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl TransportError {
    /// True for deadline expiry (connect or bounded write).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True when an operation was attempted before `connect` or after `dispose`.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }

    /// True when the connection went away underneath an in-flight operation.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
