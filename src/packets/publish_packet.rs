use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::{
    decoding::{decode_u16, decode_utf8_string},
    encoding::write_utf8_string,
    PacketType, QoS,
};

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

const DUP_FLAG: u8 = 0b0000_1000;
const QOS_SHIFT: u8 = 1;
const RETAIN_FLAG: u8 = 0b0000_0001;

/// A PUBLISH packet, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub dup: bool,
    pub retain: bool,
    /// Present iff `qos` is above `QoS::AtMostOnce`.
    pub packet_id: Option<u16>,
}

impl PublishPacket {
    /// Compute the fixed header flags: DUP (bit 3), `QoS` (bits 2-1), RETAIN (bit 0).
    pub fn flags(&self) -> u8 {
        let mut flags = self.qos.to_u8() << QOS_SHIFT;

        if self.dup {
            flags |= DUP_FLAG;
        }

        if self.retain {
            flags |= RETAIN_FLAG;
        }

        flags
    }
}

impl Packet for PublishPacket {
    fn packet_type() -> PacketType {
        PacketType::Publish
    }
}

impl DecodablePacket for PublishPacket {
    fn validate_header(flags: u8) -> Result<(), PacketError> {
        let qos = flags >> QOS_SHIFT & 0b0000_0011;
        if QoS::from_u8(qos).is_none() {
            return Err(PacketError::MalformedPacket(Some(format!(
                "PUBLISH QoS must be 0, 1 or 2. Got: {qos}"
            ))));
        }

        Ok(())
    }

    fn decode(flags: u8, mut body: Bytes) -> Result<Self, PacketError> {
        let qos = QoS::from_u8(flags >> QOS_SHIFT & 0b0000_0011)
            .ok_or_else(|| PacketError::malformed("PUBLISH QoS must be 0, 1 or 2"))?;

        let topic = decode_utf8_string(&mut body)?;

        let packet_id = if qos.needs_packet_id() { Some(decode_u16(&mut body)?) } else { None };

        // The rest of the body is the application message
        Ok(Self {
            topic,
            payload: body,
            qos,
            dup: flags & DUP_FLAG != 0,
            retain: flags & RETAIN_FLAG != 0,
            packet_id,
        })
    }
}

impl EncodablePacket for PublishPacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        let mut variable_header = BytesMut::with_capacity(2 + self.topic.len() + 2);
        write_utf8_string(&mut variable_header, &self.topic)?;

        match (self.qos.needs_packet_id(), self.packet_id) {
            (true, Some(packet_id)) => variable_header.put_u16(packet_id),
            (false, None) => {}
            (true, None) => {
                return Err(PacketError::malformed("PUBLISH with QoS > 0 needs a packet identifier"))
            }
            (false, Some(_)) => {
                return Err(PacketError::malformed("PUBLISH with QoS 0 has no packet identifier"))
            }
        }

        build_packet(Self::packet_type(), self.flags(), &variable_header, &self.payload)
    }
}
