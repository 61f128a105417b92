use bytes::Bytes;

use crate::protocol::PacketType;

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

/// Keep-alive probe. Fixed header only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReqPacket;

impl Packet for PingReqPacket {
    fn packet_type() -> PacketType {
        PacketType::PingReq
    }
}

impl EncodablePacket for PingReqPacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        build_packet(Self::packet_type(), 0, &[], &[])
    }
}

impl DecodablePacket for PingReqPacket {
    fn decode(_flags: u8, _body: Bytes) -> Result<Self, PacketError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_zero_length_packet() {
        assert_eq!(&PingReqPacket.encode().unwrap()[..], &[0xC0, 0x00]);
    }
}
