//! Length-prefixed message framing over daqlink transports.
//!
//! Every message is framed as:
//! - A 4-byte little-endian payload length
//! - One schema-encoded envelope of exactly that many bytes
//!
//! The codec is the only place message boundaries are reconstructed from the
//! byte stream. Partial reads are accumulated, oversize lengths are rejected
//! before any payload is buffered, and payloads are verified before a message
//! is returned.

pub mod codec;
pub mod error;
pub mod reader;
#[cfg(test)]
mod testing;
pub mod writer;

pub use codec::{encode_frame, read_exact, FrameConfig, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
pub use error::{FrameError, Result};
pub use reader::{read_frame, FrameReader};
pub use writer::{write_frame, FrameWriter};
