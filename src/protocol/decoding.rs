use bytes::{Buf, Bytes};

use crate::{constants::MAX_REMAINING_LENGTH_BYTES, packets::PacketError};

/// Decode a remaining length variable byte integer from the start of `buf`.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718023>
///
/// **Specification:**
///
/// ```text
/// multiplier = 1
/// value = 0
/// do
///    encodedByte = 'next byte from stream'
///    value += (encodedByte AND 127) * multiplier
///    if (multiplier > 128*128*128)
///       throw Error(Malformed Remaining Length)
///    multiplier *= 128
/// while ((encodedByte AND 128) != 0)
/// ```
///
/// Returns the decoded value and the number of bytes consumed.
///
/// # Errors
/// - Returns `PacketError::MalformedLength` if the continuation bit is still set after 4 bytes
///   or if `buf` ends before the length is complete.
pub fn decode_remaining_length(buf: &[u8]) -> Result<(usize, usize), PacketError> {
    try_decode_remaining_length(buf)?.ok_or(PacketError::MalformedLength)
}

/// Like `decode_remaining_length`, but an incomplete length yields `Ok(None)` so the caller can
/// wait for more bytes.
pub(crate) fn try_decode_remaining_length(
    buf: &[u8],
) -> Result<Option<(usize, usize)>, PacketError> {
    let mut multiplier = 1;
    let mut decoded_value = 0;

    for (index, encoded_byte) in buf.iter().enumerate() {
        // Take the 7 least significant bits
        decoded_value += (encoded_byte & 127) as usize * multiplier;

        // If the continuation bit is not set, we are done
        if encoded_byte & 128 == 0 {
            return Ok(Some((decoded_value, index + 1)));
        }

        if index + 1 == MAX_REMAINING_LENGTH_BYTES {
            return Err(PacketError::MalformedLength);
        }

        multiplier *= 128;
    }

    Ok(None)
}

/// Decode a 1-byte unsigned integer.
///
/// # Errors
/// - Returns `PacketError::MalformedPacket` if the buffer is empty.
pub fn decode_u8(buf: &mut Bytes) -> Result<u8, PacketError> {
    if buf.remaining() < 1 {
        return Err(PacketError::malformed("Failed to read u8"));
    }

    Ok(buf.get_u8())
}

/// Decode a 2-byte big-endian unsigned integer.
///
/// # Errors
/// - Returns `PacketError::MalformedPacket` if fewer than 2 bytes remain.
pub fn decode_u16(buf: &mut Bytes) -> Result<u16, PacketError> {
    if buf.remaining() < 2 {
        return Err(PacketError::malformed("Failed to read u16"));
    }

    Ok(buf.get_u16())
}

/// Decode length-prefixed binary data without copying.
///
/// # Errors
/// - Returns `PacketError::MalformedPacket` if the declared length exceeds the remaining bytes.
pub fn decode_binary_data(buf: &mut Bytes) -> Result<Bytes, PacketError> {
    let len = decode_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(PacketError::MalformedPacket(Some(format!(
            "Declared length {len} exceeds the {} remaining bytes",
            buf.remaining()
        ))));
    }

    Ok(buf.split_to(len))
}

/// Decode a length-prefixed UTF-8 string.
///
/// # Errors
/// - Returns `PacketError::MalformedPacket` if reading fails or the data is not valid UTF-8.
pub fn decode_utf8_string(buf: &mut Bytes) -> Result<String, PacketError> {
    let encoded_value = decode_binary_data(buf)?;

    String::from_utf8(encoded_value.to_vec())
        .map_err(|_| PacketError::malformed("String is not valid UTF-8"))
}
