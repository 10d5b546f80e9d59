//! Host-side orchestration for daqlink.
//!
//! A [`Host`] wraps an already-constructed transport, sends configuration and
//! commands, and exposes the device's measurements as a lazy sequence.

pub mod error;
pub mod host;
pub mod stream;

pub use error::{HostError, Result};
pub use host::{Host, HostBuilder};
pub use stream::Measurements;
