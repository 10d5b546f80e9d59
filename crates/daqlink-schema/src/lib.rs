//! Message model and wire schema for daqlink.
//!
//! Every frame payload is one protobuf-encoded envelope holding exactly one
//! of [`Command`], [`Configuration`] or [`Measurement`]. Decoding verifies
//! the envelope structure before any field is trusted.

pub mod error;
pub mod model;
mod validator;
pub mod wire;

pub use error::{ConfigurationError, Result, SchemaError};
pub use model::{
    Command, CommandCode, Configuration, Measurement, Message, MAX_MEASUREMENTS_PER_SECOND,
};
pub use wire::{
    decode_message, encode_message, encode_to_vec, encoded_len, measurement_frame_len,
};
