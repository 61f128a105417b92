use std::{error::Error, fmt};

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::{
    decoding::{decode_remaining_length, try_decode_remaining_length},
    encoding::encode_remaining_length,
    PacketType,
};

pub mod ack_packet;
pub mod conn_ack_packet;
pub mod connect_packet;
pub mod disconnect_packet;
pub mod ping_req_packet;
pub mod ping_resp_packet;
pub mod publish_packet;
pub mod subscribe_packet;
pub mod unsubscribe_packet;

/// A control packet with a fixed packet type.
pub trait Packet {
    fn packet_type() -> PacketType;
}

pub trait DecodablePacket: Packet + Sized {
    /// Validate the 4 flag bits of the fixed header.
    ///
    /// The default accepts only the flags reserved for the packet type.
    fn validate_header(flags: u8) -> Result<(), PacketError> {
        let expected = Self::packet_type().reserved_flags();
        if flags != expected {
            return Err(PacketError::MalformedPacket(Some(format!(
                "{} fixed header flags must be {expected:#06b}, got {flags:#06b}",
                Self::packet_type()
            ))));
        }

        Ok(())
    }

    fn decode(flags: u8, body: Bytes) -> Result<Self, PacketError>;
}

pub trait EncodablePacket: Packet {
    fn encode(&self) -> Result<Bytes, PacketError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// The remaining length is longer than 4 bytes or ends prematurely.
    MalformedLength,
    /// Fewer body bytes are available than the remaining length declares.
    TruncatedPacket { expected: usize, available: usize },
    /// The packet type is reserved, or not one a client should receive.
    UnexpectedPacketType(u8),
    MalformedPacket(Option<String>),
    PacketTooLarge,
    StringTooLong(usize),
}

impl PacketError {
    pub(crate) fn malformed(reason: &str) -> Self {
        Self::MalformedPacket(Some(reason.to_string()))
    }
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLength => write!(f, "Malformed Remaining Length"),

            Self::TruncatedPacket { expected, available } => {
                write!(f, "Truncated Packet: expected {expected} bytes, got {available}")
            }

            Self::UnexpectedPacketType(code) => write!(f, "Unexpected Packet Type: {code}"),

            Self::MalformedPacket(Some(reason)) => write!(f, "Malformed Packet: {reason}"),
            Self::MalformedPacket(None) => write!(f, "Malformed Packet"),

            Self::PacketTooLarge => write!(f, "Packet Too Large"),

            Self::StringTooLong(len) => {
                write!(f, "String Too Long: {len} bytes does not fit a 16-bit length")
            }
        }
    }
}

impl Error for PacketError {}

/// A framed packet: the fixed header split into type and flags, plus the body that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub packet_type: PacketType,
    pub flags: u8,
    pub body: Bytes,
}

impl RawPacket {
    /// Decode the body as a specific packet.
    ///
    /// # Errors
    /// - Returns `PacketError::UnexpectedPacketType` if the frame holds a different packet type.
    /// - Returns the decoder error if the header flags or the body are invalid.
    pub fn decode<P: DecodablePacket>(self) -> Result<P, PacketError> {
        if self.packet_type != P::packet_type() {
            return Err(PacketError::UnexpectedPacketType(self.packet_type.to_u8()));
        }

        P::validate_header(self.flags)?;
        P::decode(self.flags, self.body)
    }
}

/// Assemble a control packet.
///
/// Writes the control byte (`type << 4 | flags & 0x0F`), the encoded remaining length, then the
/// variable header and the payload, in that order. The result is exactly
/// `1 + len(remaining length) + len(variable header) + len(payload)` bytes long.
///
/// # Errors
/// - Returns `PacketError::PacketTooLarge` if the remaining length does not fit 4 bytes.
pub fn build_packet(
    packet_type: PacketType,
    flags: u8,
    variable_header: &[u8],
    payload: &[u8],
) -> Result<Bytes, PacketError> {
    let remaining_len = variable_header.len() + payload.len();
    let encoded_remaining_len = encode_remaining_length(remaining_len)?;

    let mut packet = BytesMut::with_capacity(1 + encoded_remaining_len.len() + remaining_len);
    packet.put_u8(packet_type.control_byte(flags));
    packet.put_slice(&encoded_remaining_len);
    packet.put_slice(variable_header);
    packet.put_slice(payload);

    Ok(packet.freeze())
}

/// Parse exactly one packet from the start of `buffer`.
///
/// Bytes past the declared remaining length are ignored.
///
/// # Errors
/// - Returns `PacketError::UnexpectedPacketType` for the reserved type codes 0 and 15.
/// - Returns `PacketError::MalformedLength` if the remaining length is invalid.
/// - Returns `PacketError::TruncatedPacket` if the body is shorter than declared.
pub fn parse_packet(buffer: &Bytes) -> Result<RawPacket, PacketError> {
    let Some(&fixed_header) = buffer.first() else {
        return Err(PacketError::TruncatedPacket { expected: 2, available: 0 });
    };
    let packet_type = packet_type_of(fixed_header)?;

    let (remaining_len, len_bytes) = decode_remaining_length(&buffer[1..])?;
    let start = 1 + len_bytes;
    let available = buffer.len() - start;
    if available < remaining_len {
        return Err(PacketError::TruncatedPacket { expected: remaining_len, available });
    }

    Ok(RawPacket {
        packet_type,
        flags: fixed_header & 0x0F,
        body: buffer.slice(start..start + remaining_len),
    })
}

/// Size of the first frame in `buffer`, or `None` if more bytes are needed to tell.
///
/// The frame size includes the fixed header.
pub(crate) fn frame_len(buffer: &[u8]) -> Result<Option<usize>, PacketError> {
    let Some(&fixed_header) = buffer.first() else {
        return Ok(None);
    };
    packet_type_of(fixed_header)?;

    match try_decode_remaining_length(&buffer[1..])? {
        Some((remaining_len, len_bytes)) => Ok(Some(1 + len_bytes + remaining_len)),
        None => Ok(None),
    }
}

fn packet_type_of(fixed_header: u8) -> Result<PacketType, PacketError> {
    let code = fixed_header >> 4;
    PacketType::from_u8(code).ok_or(PacketError::UnexpectedPacketType(code))
}
