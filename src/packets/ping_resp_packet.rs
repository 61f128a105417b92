use bytes::Bytes;

use crate::protocol::PacketType;

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingRespPacket;

impl Packet for PingRespPacket {
    fn packet_type() -> PacketType {
        PacketType::PingResp
    }
}

impl DecodablePacket for PingRespPacket {
    fn decode(_flags: u8, _body: Bytes) -> Result<Self, PacketError> {
        Ok(Self)
    }
}

impl EncodablePacket for PingRespPacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        build_packet(Self::packet_type(), 0, &[], &[])
    }
}
