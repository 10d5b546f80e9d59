use prost::encoding::{decode_key, skip_field, DecodeContext, WireType};

use crate::error::{Result, SchemaError};
use crate::model::Message;

const FIRST_PAYLOAD_TAG: u32 = 1;
const LAST_PAYLOAD_TAG: u32 = 3;

/// Walk the top-level fields of an envelope without decoding them.
///
/// A protobuf decoder silently keeps the last one-of variant it sees, so a
/// payload carrying two variants must be caught here, before decoding.
pub(crate) fn verify_envelope(payload: &[u8]) -> Result<()> {
    let mut buf = payload;
    let mut seen = 0u32;

    while !buf.is_empty() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        if matches!(wire_type, WireType::StartGroup | WireType::EndGroup) {
            return Err(SchemaError::UnsupportedWireType { tag, wire_type });
        }
        if (FIRST_PAYLOAD_TAG..=LAST_PAYLOAD_TAG).contains(&tag) {
            seen |= 1 << tag;
        }
        skip_field(wire_type, tag, &mut buf, DecodeContext::default())?;
    }

    let count = seen.count_ones();
    if count > 1 {
        return Err(SchemaError::MultiplePayloads { count });
    }
    Ok(())
}

/// Reject decoded values the type system cannot rule out.
pub(crate) fn verify_message(message: &Message) -> Result<()> {
    if let Message::Command(command) = message {
        if command.command_code().is_none() {
            return Err(SchemaError::UnknownCommandCode(command.code));
        }
    }
    Ok(())
}
