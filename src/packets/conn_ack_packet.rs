use std::fmt;

use bytes::Bytes;

use crate::protocol::{decoding::decode_u8, PacketType};

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

/// Represents the return codes a broker sends in CONNACK.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc385349256>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted,

    /// The Server does not support the level of the MQTT protocol requested by the Client.
    UnsupportedProtocolLevel,

    /// The Client identifier is correct UTF-8 but not allowed by the Server.
    InvalidClientId,

    /// The Network Connection has been made but the MQTT service is unavailable.
    ServiceUnavailable,

    /// The data in the user name or password is malformed.
    BadUserNameOrPassword,

    /// The Client is not authorized to connect.
    NotAuthorized,

    /// Any code the protocol does not define.
    Other(u8),
}

impl ConnectReturnCode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Accepted,
            1 => Self::UnsupportedProtocolLevel,
            2 => Self::InvalidClientId,
            3 => Self::ServiceUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            other => Self::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::UnsupportedProtocolLevel => 1,
            Self::InvalidClientId => 2,
            Self::ServiceUnavailable => 3,
            Self::BadUserNameOrPassword => 4,
            Self::NotAuthorized => 5,
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "Connection accepted"),
            Self::UnsupportedProtocolLevel => write!(f, "Unsupported protocol level"),
            Self::InvalidClientId => write!(f, "Invalid client identifier"),
            Self::ServiceUnavailable => write!(f, "Service unavailable"),
            Self::BadUserNameOrPassword => write!(f, "Malformed username or password"),
            Self::NotAuthorized => write!(f, "Client not authorized"),
            Self::Other(code) => write!(f, "Connection failed with return code {code}"),
        }
    }
}

/// The CONNACK packet is the packet sent by the Server in response to a CONNECT packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAckPacket {
    /// Whether the Server resumed Session State from a previous connection for this Client.
    pub session_present: bool,

    pub return_code: ConnectReturnCode,
}

impl Packet for ConnAckPacket {
    fn packet_type() -> PacketType {
        PacketType::ConnAck
    }
}

impl DecodablePacket for ConnAckPacket {
    fn decode(_flags: u8, mut body: Bytes) -> Result<Self, PacketError> {
        // Byte 1 is the "Connect Acknowledge Flags", bit 0 is the Session Present flag
        let acknowledge_flags = decode_u8(&mut body)?;
        let return_code = ConnectReturnCode::from_u8(decode_u8(&mut body)?);

        Ok(Self { session_present: acknowledge_flags & 0x01 == 1, return_code })
    }
}

impl EncodablePacket for ConnAckPacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        let variable_header = [u8::from(self.session_present), self.return_code.to_u8()];
        build_packet(Self::packet_type(), 0, &variable_header, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::parse_packet;

    #[test]
    fn decodes_session_present_and_return_code() {
        let buffer = Bytes::from_static(&[0x20, 0x02, 0x01, 0x00]);

        let packet: ConnAckPacket = parse_packet(&buffer).unwrap().decode().unwrap();
        assert!(packet.session_present);
        assert_eq!(packet.return_code, ConnectReturnCode::Accepted);
    }

    #[test]
    fn return_codes_map_to_reasons() {
        let reasons: Vec<String> =
            (1..=6).map(|code| ConnectReturnCode::from_u8(code).to_string()).collect();

        assert_eq!(
            reasons,
            vec![
                "Unsupported protocol level",
                "Invalid client identifier",
                "Service unavailable",
                "Malformed username or password",
                "Client not authorized",
                "Connection failed with return code 6",
            ]
        );
    }

    #[test]
    fn encodes_what_it_decodes() {
        let packet =
            ConnAckPacket { session_present: false, return_code: ConnectReturnCode::NotAuthorized };

        let encoded = packet.encode().unwrap();
        assert_eq!(&encoded[..], &[0x20, 0x02, 0x00, 0x05]);
    }

    #[test]
    fn short_body_is_malformed() {
        let buffer = Bytes::from_static(&[0x20, 0x01, 0x00]);
        let result = parse_packet(&buffer).unwrap().decode::<ConnAckPacket>();
        assert!(matches!(result, Err(PacketError::MalformedPacket(_))));
    }
}
