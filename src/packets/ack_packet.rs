//! Packets whose body is only a packet identifier: PUBACK, PUBREC, PUBREL, PUBCOMP and UNSUBACK.

use bytes::Bytes;

use crate::protocol::{decoding::decode_u16, PacketType};

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

macro_rules! packet_id_only {
    ($(#[$meta:meta])* $name:ident, $packet_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub packet_id: u16,
        }

        impl $name {
            pub fn new(packet_id: u16) -> Self {
                Self { packet_id }
            }
        }

        impl Packet for $name {
            fn packet_type() -> PacketType {
                $packet_type
            }
        }

        impl DecodablePacket for $name {
            fn decode(_flags: u8, mut body: Bytes) -> Result<Self, PacketError> {
                let packet_id = decode_u16(&mut body)?;
                Ok(Self { packet_id })
            }
        }

        impl EncodablePacket for $name {
            fn encode(&self) -> Result<Bytes, PacketError> {
                let packet_type = Self::packet_type();
                build_packet(
                    packet_type,
                    packet_type.reserved_flags(),
                    &self.packet_id.to_be_bytes(),
                    &[],
                )
            }
        }
    };
}

packet_id_only!(
    /// Response to a `QoS` 1 PUBLISH.
    PubAckPacket,
    PacketType::PubAck
);

packet_id_only!(
    /// Response to a `QoS` 2 PUBLISH, first step of the exactly once exchange.
    PubRecPacket,
    PacketType::PubRec
);

packet_id_only!(
    /// Response to a PUBREC. Fixed header flags are 0010.
    PubRelPacket,
    PacketType::PubRel
);

packet_id_only!(
    /// Response to a PUBREL, last step of the exactly once exchange.
    PubCompPacket,
    PacketType::PubComp
);

packet_id_only!(
    /// Response to an UNSUBSCRIBE.
    UnsubAckPacket,
    PacketType::UnsubAck
);
