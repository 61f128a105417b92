use bytes::{Buf, Bytes, BytesMut};

use crate::protocol::{
    decoding::{decode_u16, decode_utf8_string},
    encoding::write_utf8_string,
    PacketType,
};

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub topic_filters: Vec<String>,
}

impl Packet for UnsubscribePacket {
    fn packet_type() -> PacketType {
        PacketType::Unsubscribe
    }
}

impl EncodablePacket for UnsubscribePacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        let mut payload = BytesMut::new();
        for topic_filter in &self.topic_filters {
            write_utf8_string(&mut payload, topic_filter)?;
        }

        let packet_type = Self::packet_type();
        build_packet(
            packet_type,
            packet_type.reserved_flags(),
            &self.packet_id.to_be_bytes(),
            &payload,
        )
    }
}

impl DecodablePacket for UnsubscribePacket {
    fn decode(_flags: u8, mut body: Bytes) -> Result<Self, PacketError> {
        let packet_id = decode_u16(&mut body)?;

        if !body.has_remaining() {
            return Err(PacketError::malformed("UNSUBSCRIBE without topic filters"));
        }

        let mut topic_filters = Vec::new();
        while body.has_remaining() {
            topic_filters.push(decode_utf8_string(&mut body)?);
        }

        Ok(Self { packet_id, topic_filters })
    }
}
