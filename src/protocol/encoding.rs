use bytes::{BufMut, BytesMut};

use crate::{constants::MAX_REMAINING_LENGTH, packets::PacketError};

/// Encode the remaining length as a variable byte integer.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718023>
///
/// **Specification:**
///
/// ```text
/// do
///    encodedByte = X MOD 128
///    X = X DIV 128
///    // if there are more data to encode, set the top bit of this byte
///    if (X > 0)
///       encodedByte = encodedByte OR 128
///    endif
///    'output' encodedByte
/// while (X > 0)
/// ```
///
/// The output always uses the minimum number of bytes.
///
/// # Errors
/// - Returns `PacketError::PacketTooLarge` if `value` exceeds `MAX_REMAINING_LENGTH`.
pub fn encode_remaining_length(mut value: usize) -> Result<Vec<u8>, PacketError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(PacketError::PacketTooLarge);
    }

    let capacity = match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    };
    let mut encoded_value = Vec::with_capacity(capacity);

    for _ in 0..capacity {
        // Extract the 7 least significant bits from the current value
        let mut encoded_byte = (value % 128) as u8;

        value /= 128;

        // If there are still remaining bits to encode, mark this byte as continuation
        if value > 0 {
            encoded_byte |= 128;
        }

        encoded_value.push(encoded_byte);
    }

    Ok(encoded_value)
}

/// Write a length-prefixed UTF-8 string.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718016>
///
/// # Errors
/// - Returns `PacketError::StringTooLong` if the string does not fit a 16-bit length.
pub fn write_utf8_string(buf: &mut BytesMut, value: &str) -> Result<(), PacketError> {
    write_binary_data(buf, value.as_bytes())
}

/// Write length-prefixed binary data, as used for the will message and password.
///
/// # Errors
/// - Returns `PacketError::StringTooLong` if the data does not fit a 16-bit length.
pub fn write_binary_data(buf: &mut BytesMut, value: &[u8]) -> Result<(), PacketError> {
    // MQTT requires that the length must fit within 2 bytes (0 to 65_535).
    let len = value.len();
    let casted_len = u16::try_from(len).map_err(|_| PacketError::StringTooLong(len))?;

    buf.reserve(2 + len);
    buf.put_u16(casted_len);
    buf.put_slice(value);

    Ok(())
}
