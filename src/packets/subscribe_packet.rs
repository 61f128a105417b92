use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::{
    decoding::{decode_u16, decode_u8, decode_utf8_string},
    encoding::write_utf8_string,
    PacketType, QoS,
};

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

/// SUBACK return code for a rejected subscription.
pub const SUBSCRIPTION_FAILURE: u8 = 0x80;

/// A topic filter and the maximum `QoS` requested for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic_filter: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic_filter: impl Into<String>, qos: QoS) -> Self {
        Self { topic_filter: topic_filter.into(), qos }
    }
}

impl From<&str> for Subscription {
    fn from(topic_filter: &str) -> Self {
        Self::new(topic_filter, QoS::AtMostOnce)
    }
}

impl From<String> for Subscription {
    fn from(topic_filter: String) -> Self {
        Self::new(topic_filter, QoS::AtMostOnce)
    }
}

impl From<(&str, QoS)> for Subscription {
    fn from((topic_filter, qos): (&str, QoS)) -> Self {
        Self::new(topic_filter, qos)
    }
}

impl From<(String, QoS)> for Subscription {
    fn from((topic_filter, qos): (String, QoS)) -> Self {
        Self::new(topic_filter, qos)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub subscriptions: Vec<Subscription>,
}

impl Packet for SubscribePacket {
    fn packet_type() -> PacketType {
        PacketType::Subscribe
    }
}

impl EncodablePacket for SubscribePacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        // Payload: repeated (topic filter, requested QoS)
        let mut payload = BytesMut::new();
        for subscription in &self.subscriptions {
            write_utf8_string(&mut payload, &subscription.topic_filter)?;
            payload.put_u8(subscription.qos.to_u8());
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

impl DecodablePacket for SubscribePacket {
    fn decode(_flags: u8, mut body: Bytes) -> Result<Self, PacketError> {
        let packet_id = decode_u16(&mut body)?;

        // The payload of a SUBSCRIBE packet must contain at least one topic filter
        if !body.has_remaining() {
            return Err(PacketError::malformed("SUBSCRIBE without topic filters"));
        }

        let mut subscriptions = Vec::new();
        while body.has_remaining() {
            let topic_filter = decode_utf8_string(&mut body)?;

            let requested_qos = decode_u8(&mut body)?;
            let Some(qos) = QoS::from_u8(requested_qos) else {
                return Err(PacketError::MalformedPacket(Some(format!(
                    "Requested QoS must be 0, 1 or 2. Got: {requested_qos}"
                ))));
            };

            subscriptions.push(Subscription { topic_filter, qos });
        }

        Ok(Self { packet_id, subscriptions })
    }
}

/// Response to a SUBSCRIBE: one return code per requested filter, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAckPacket {
    pub packet_id: u16,
    /// Granted `QoS` (0, 1, 2) or `SUBSCRIPTION_FAILURE`, kept verbatim.
    pub return_codes: Vec<u8>,
}

impl Packet for SubAckPacket {
    fn packet_type() -> PacketType {
        PacketType::SubAck
    }
}

impl DecodablePacket for SubAckPacket {
    fn decode(_flags: u8, mut body: Bytes) -> Result<Self, PacketError> {
        let packet_id = decode_u16(&mut body)?;
        Ok(Self { packet_id, return_codes: body.to_vec() })
    }
}

impl EncodablePacket for SubAckPacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        build_packet(Self::packet_type(), 0, &self.packet_id.to_be_bytes(), &self.return_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::parse_packet;

    #[test]
    fn subscribe_uses_reserved_flags_and_repeats_entries() {
        let packet = SubscribePacket {
            packet_id: 1,
            subscriptions: vec![("x", QoS::AtLeastOnce).into(), "y".into()],
        };

        let encoded = packet.encode().unwrap();
        #[rustfmt::skip]
        let expected = [
            0x82, 0x0A,
            0x00, 0x01,
            0x00, 0x01, b'x', 0x01,
            0x00, 0x01, b'y', 0x00,
        ];
        assert_eq!(&encoded[..], &expected);

        let decoded: SubscribePacket = parse_packet(&encoded).unwrap().decode().unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn suback_keeps_failure_codes_verbatim() {
        let buffer = Bytes::from_static(&[0x90, 0x04, 0x00, 0x02, 0x01, 0x80]);

        let packet: SubAckPacket = parse_packet(&buffer).unwrap().decode().unwrap();
        assert_eq!(packet.packet_id, 2);
        assert_eq!(packet.return_codes, vec![1, SUBSCRIPTION_FAILURE]);
        assert_eq!(packet.encode().unwrap(), buffer);
    }

    #[test]
    fn subscribe_without_filters_is_malformed() {
        let buffer = Bytes::from_static(&[0x82, 0x02, 0x00, 0x01]);
        let result = parse_packet(&buffer).unwrap().decode::<SubscribePacket>();
        assert!(matches!(result, Err(PacketError::MalformedPacket(_))));
    }
}
