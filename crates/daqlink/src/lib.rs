//! Framed measurement link between a data-acquisition device and its host.
//!
//! daqlink carries three message kinds (commands, configuration, and
//! measurement batches) as length-prefixed protobuf frames over a named pipe
//! or a TCP socket.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream endpoints (named pipe, TCP) and the device-side listener
//! - [`schema`]: message model and wire schema
//! - [`frame`]: length-prefixed framing with structural verification
//! - [`device`]: device protocol engine (behind `device` feature)
//! - [`host`]: host orchestrator and measurement stream (behind `host` feature)

/// Re-export transport types.
pub mod transport {
    pub use daqlink_transport::*;
}

/// Re-export schema types.
pub mod schema {
    pub use daqlink_schema::*;
}

/// Re-export frame types.
pub mod frame {
    pub use daqlink_frame::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use daqlink_device::*;
}

/// Re-export host types (requires `host` feature).
#[cfg(feature = "host")]
pub mod host {
    pub use daqlink_host::*;
}
