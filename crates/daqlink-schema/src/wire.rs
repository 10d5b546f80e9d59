use bytes::BufMut;
use prost::encoding::encoded_len_varint;
use prost::Message as ProstMessage;

use crate::error::{Result, SchemaError};
use crate::model::Message;
use crate::validator::{verify_envelope, verify_message};

/// Top-level wire container: exactly one of the message variants.
#[derive(Clone, PartialEq, prost::Message)]
struct Envelope {
    #[prost(oneof = "Message", tags = "1, 2, 3")]
    message_type: Option<Message>,
}

/// Number of bytes [`encode_message`] will produce.
pub fn encoded_len(message: &Message) -> usize {
    message.encoded_len()
}

/// Envelope size of a measurement carrying `samples` values, computed
/// without building it.
///
/// Samples are packed 32-bit floats: field tag, length varint and `4 * n`
/// bytes, wrapped in the envelope's own tag and length.
pub fn measurement_frame_len(samples: usize) -> usize {
    let data = (samples as u64).saturating_mul(4);
    let body = if data == 0 {
        0
    } else {
        1 + encoded_len_varint(data) as u64 + data
    };
    let envelope = 1 + encoded_len_varint(body) as u64 + body;
    usize::try_from(envelope).unwrap_or(usize::MAX)
}

/// Append the envelope encoding of `message` to `dst`.
///
/// The envelope has a single one-of field, so its encoding is exactly the
/// encoding of the populated variant.
pub fn encode_message(message: &Message, dst: &mut impl BufMut) {
    message.encode(dst);
}

/// Envelope encoding of `message` as a fresh buffer.
pub fn encode_to_vec(message: &Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(message));
    encode_message(message, &mut out);
    out
}

/// Decode and verify one envelope payload.
///
/// Fails when the bytes do not match the schema, when no variant or more
/// than one variant is populated, or when a command code is unknown.
pub fn decode_message(payload: &[u8]) -> Result<Message> {
    verify_envelope(payload)?;
    let envelope = Envelope::decode(payload)?;
    let message = envelope.message_type.ok_or(SchemaError::EmptyEnvelope)?;
    verify_message(&message)?;
    Ok(message)
}
