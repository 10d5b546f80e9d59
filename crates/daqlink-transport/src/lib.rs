//! Byte-stream transports for daqlink.
//!
//! Provides one capability interface ([`Transport`]) over a closed set of
//! endpoint variants:
//! - Named pipes (Windows pipes; Unix domain sockets on Linux/macOS)
//! - TCP sockets
//!
//! This is the lowest layer of daqlink. Everything else builds on top of the
//! [`Communicator`] type provided here.

pub mod communicator;
pub mod config;
pub mod error;
pub mod listener;
mod stream;
pub mod traits;

pub use communicator::{Communicator, ConnectionState};
pub use config::{
    pipe_path, ConnectionKind, Endpoint, TransportConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST,
    DEFAULT_PIPE_NAME, DEFAULT_PORT,
};
pub use error::{Result, TransportError};
pub use listener::Listener;
pub use traits::Transport;
