use bytes::Bytes;

use crate::protocol::PacketType;

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

/// The DISCONNECT packet is the final MQTT Control Packet sent from the Client.
///
/// MQTT 3.1.1 carries no reason code, so the packet is a bare fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectPacket;

impl Packet for DisconnectPacket {
    fn packet_type() -> PacketType {
        PacketType::Disconnect
    }
}

impl EncodablePacket for DisconnectPacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        build_packet(Self::packet_type(), 0, &[], &[])
    }
}

impl DecodablePacket for DisconnectPacket {
    fn decode(_flags: u8, _body: Bytes) -> Result<Self, PacketError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::parse_packet;

    #[test]
    fn encodes_zero_length_packet() {
        let encoded = DisconnectPacket.encode().unwrap();
        assert_eq!(&encoded[..], &[0xE0, 0x00]);

        let raw = parse_packet(&encoded).unwrap();
        assert_eq!(raw.decode::<DisconnectPacket>().unwrap(), DisconnectPacket);
    }
}
