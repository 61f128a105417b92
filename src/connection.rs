use std::io;

use bytes::{Bytes, BytesMut};
use log::trace;
use tokio::sync::mpsc;

use crate::{
    constants::RECEIVE_BUFFER_CAPACITY,
    packets::{frame_len, parse_packet, PacketError, RawPacket},
};

/// The byte-stream the client writes packets to.
///
/// Whoever owns the transport feeds inbound bytes back through
/// [`DeliveryClient::handle_data`](crate::client::DeliveryClient::handle_data) and reports
/// closure with [`DeliveryClient::handle_close`](crate::client::DeliveryClient::handle_close).
pub trait Transport {
    /// Hand one complete packet to the transport. Buffering is the transport's concern.
    fn send(&mut self, packet: Bytes) -> io::Result<()>;
}

/// Sending into a channel lets a separate task own the actual socket.
impl Transport for mpsc::UnboundedSender<Bytes> {
    fn send(&mut self, packet: Bytes) -> io::Result<()> {
        mpsc::UnboundedSender::send(&*self, packet)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transport receiver dropped"))
    }
}

/// Accumulates inbound bytes and cuts them into packets.
///
/// A delivery may hold part of a packet, or several packets; both are handled here.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buffer: BytesMut,
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self { buffer: BytesMut::with_capacity(RECEIVE_BUFFER_CAPACITY) }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete packet off the buffer.
    ///
    /// Returns `None` until all bytes of the next packet have arrived.
    ///
    /// # Errors
    /// - Returns `PacketError` if the buffered bytes cannot start a valid packet. The buffer is
    ///   left as is, callers should treat the stream as unusable.
    pub fn next_packet(&mut self) -> Result<Option<RawPacket>, PacketError> {
        let Some(frame_len) = frame_len(&self.buffer)? else {
            return Ok(None);
        };

        if self.buffer.len() < frame_len {
            trace!("Waiting for {} more bytes", frame_len - self.buffer.len());
            return Ok(None);
        }

        let frame = self.buffer.split_to(frame_len).freeze();
        parse_packet(&frame).map(Some)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PacketType;

    #[test]
    fn reassembles_fragmented_packet() {
        let mut buffer = ReceiveBuffer::new();

        buffer.extend(&[0x90]);
        assert_eq!(buffer.next_packet().unwrap(), None);

        buffer.extend(&[0x03, 0x00]);
        assert_eq!(buffer.next_packet().unwrap(), None);

        buffer.extend(&[0x01, 0x00]);
        let packet = buffer.next_packet().unwrap().unwrap();
        assert_eq!(packet.packet_type, PacketType::SubAck);
        assert_eq!(&packet.body[..], &[0x00, 0x01, 0x00]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn splits_coalesced_packets() {
        let mut buffer = ReceiveBuffer::new();
        buffer.extend(&[0x40, 0x02, 0x00, 0x01, 0xD0, 0x00, 0x70, 0x02, 0x00]);

        let first = buffer.next_packet().unwrap().unwrap();
        assert_eq!(first.packet_type, PacketType::PubAck);

        let second = buffer.next_packet().unwrap().unwrap();
        assert_eq!(second.packet_type, PacketType::PingResp);

        // Third packet is incomplete
        assert_eq!(buffer.next_packet().unwrap(), None);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn invalid_type_is_reported() {
        let mut buffer = ReceiveBuffer::new();
        buffer.extend(&[0xF0, 0x00]);

        assert_eq!(buffer.next_packet(), Err(PacketError::UnexpectedPacketType(15)));
    }

    #[test]
    fn channel_transport_forwards_packets() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();

        Transport::send(&mut tx, Bytes::from_static(&[0xC0, 0x00])).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(&[0xC0, 0x00]));

        drop(rx);
        assert!(Transport::send(&mut tx, Bytes::new()).is_err());
    }
}
