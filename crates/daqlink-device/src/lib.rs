//! Device-side protocol engine for daqlink.
//!
//! The engine consumes configuration and command frames from a host and,
//! while running, emits one measurement frame per sampling period. Each
//! connection gets a fresh session that starts Idle with no configuration.

pub mod engine;
pub mod error;
pub mod server;
pub mod source;

pub use engine::{
    DeviceEngine, EngineConfig, EngineState, Transition, DEFAULT_INBOX_CAPACITY,
    DEFAULT_WRITE_TIMEOUT,
};
pub use error::{DeviceError, Result};
pub use server::DeviceServer;
pub use source::{SampleSource, SineWave};
