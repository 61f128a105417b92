use std::collections::HashMap;

use log::{debug, trace, warn};
use tokio::sync::oneshot;

use crate::{error::ClientError, packets::conn_ack_packet::ConnAckPacket, protocol::PacketType};

/// The acknowledgment that completes a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    ConnAck(ConnAckPacket),
    PubAck,
    PubComp,
    /// Return codes from the SUBACK body, in request order.
    SubAck(Vec<u8>),
    UnsubAck,
}

impl Ack {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::ConnAck(_) => PacketType::ConnAck,
            Self::PubAck => PacketType::PubAck,
            Self::PubComp => PacketType::PubComp,
            Self::SubAck(_) => PacketType::SubAck,
            Self::UnsubAck => PacketType::UnsubAck,
        }
    }
}

pub type AckResult = Result<Ack, ClientError>;

#[derive(Debug)]
struct PendingAck {
    expects: PacketType,
    tx: oneshot::Sender<AckResult>,
}

/// Pending single-shot completions keyed by packet identifier.
///
/// Identifier 0 is the CONNECT/CONNACK handshake. Each entry is fulfilled at most once and
/// removed when fulfilled.
#[derive(Debug, Default)]
pub struct AckRegistry {
    pending: HashMap<u16, PendingAck>,
}

impl AckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a completion for `packet_id`, to be fulfilled by an acknowledgment of type
    /// `expects`.
    ///
    /// Registering over a live identifier replaces it: the last registration wins and the
    /// displaced completion fails with `ClientError::Superseded`.
    pub fn register(&mut self, packet_id: u16, expects: PacketType) -> oneshot::Receiver<AckResult> {
        let (tx, rx) = oneshot::channel();

        if let Some(previous) = self.pending.insert(packet_id, PendingAck { expects, tx }) {
            warn!("Packet identifier {packet_id} registered while still waiting for {}", previous.expects);
            let _ = previous.tx.send(Err(ClientError::Superseded(packet_id)));
        }

        rx
    }

    /// Fulfill and remove the completion for `packet_id`.
    ///
    /// Returns `false` without touching the registry when nothing waits for `packet_id`, or
    /// when the entry waits for a different acknowledgment type. Duplicate and late
    /// acknowledgments are normal network conditions, not errors.
    pub fn resolve(&mut self, packet_id: u16, ack: Ack) -> bool {
        let packet_type = ack.packet_type();

        match self.pending.get(&packet_id) {
            Some(entry) if entry.expects == packet_type => {}
            Some(entry) => {
                debug!(
                    "Ignoring {packet_type} for packet identifier {packet_id}, waiting for {}",
                    entry.expects
                );
                return false;
            }
            None => {
                debug!("Ignoring orphan {packet_type} for packet identifier {packet_id}");
                return false;
            }
        }

        match self.pending.remove(&packet_id) {
            Some(entry) => {
                if entry.tx.send(Ok(ack)).is_err() {
                    trace!("Completion for packet identifier {packet_id} was dropped");
                }
                true
            }
            None => false,
        }
    }

    /// Fail and remove the completion for `packet_id`.
    pub fn fail(&mut self, packet_id: u16, error: ClientError) -> bool {
        match self.pending.remove(&packet_id) {
            Some(entry) => {
                let _ = entry.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every pending completion, so no caller waits forever on a dead connection.
    pub fn cancel_all<F>(&mut self, error: F)
    where
        F: Fn() -> ClientError,
    {
        let pending = std::mem::take(&mut self.pending);
        debug!("Cancelling {} pending acknowledgments", pending.len());

        for (_, entry) in pending {
            let _ = entry.tx.send(Err(error()));
        }
    }

    pub fn contains(&self, packet_id: u16) -> bool {
        self.pending.contains_key(&packet_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;

    #[test]
    fn resolves_matching_identifier_once() {
        let mut registry = AckRegistry::new();
        let mut rx = registry.register(3, PacketType::PubAck);

        assert!(registry.resolve(3, Ack::PubAck));
        assert_eq!(rx.try_recv().unwrap().unwrap(), Ack::PubAck);
        assert!(registry.is_empty());

        // A duplicate acknowledgment finds nothing
        assert!(!registry.resolve(3, Ack::PubAck));
    }

    #[test]
    fn other_identifier_leaves_entry_pending() {
        let mut registry = AckRegistry::new();
        let mut rx = registry.register(1, PacketType::PubAck);

        assert!(!registry.resolve(2, Ack::PubAck));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(registry.contains(1));
    }

    #[test]
    fn wrong_acknowledgment_type_is_ignored() {
        let mut registry = AckRegistry::new();
        let mut rx = registry.register(5, PacketType::PubComp);

        assert!(!registry.resolve(5, Ack::PubAck));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        assert!(registry.resolve(5, Ack::PubComp));
        assert_eq!(rx.try_recv().unwrap().unwrap(), Ack::PubComp);
    }

    #[test]
    fn out_of_order_acknowledgments_reach_their_requests() {
        let mut registry = AckRegistry::new();
        let mut first = registry.register(1, PacketType::SubAck);
        let mut second = registry.register(2, PacketType::SubAck);

        registry.resolve(2, Ack::SubAck(vec![0]));
        registry.resolve(1, Ack::SubAck(vec![1]));

        assert_eq!(first.try_recv().unwrap().unwrap(), Ack::SubAck(vec![1]));
        assert_eq!(second.try_recv().unwrap().unwrap(), Ack::SubAck(vec![0]));
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = AckRegistry::new();
        let mut first = registry.register(9, PacketType::PubAck);
        let mut second = registry.register(9, PacketType::UnsubAck);

        assert!(matches!(first.try_recv().unwrap(), Err(ClientError::Superseded(9))));

        assert!(registry.resolve(9, Ack::UnsubAck));
        assert_eq!(second.try_recv().unwrap().unwrap(), Ack::UnsubAck);
    }

    #[test]
    fn cancel_all_fails_every_entry() {
        let mut registry = AckRegistry::new();
        let mut three = registry.register(3, PacketType::PubAck);
        let mut seven = registry.register(7, PacketType::SubAck);

        registry.cancel_all(|| ClientError::TransportClosed);

        assert!(matches!(three.try_recv().unwrap(), Err(ClientError::TransportClosed)));
        assert!(matches!(seven.try_recv().unwrap(), Err(ClientError::TransportClosed)));
        assert!(registry.is_empty());
    }

    #[test]
    fn fail_removes_entry() {
        let mut registry = AckRegistry::new();
        let mut rx = registry.register(0, PacketType::ConnAck);

        assert!(registry.fail(0, ClientError::Cancelled));
        assert!(matches!(rx.try_recv().unwrap(), Err(ClientError::Cancelled)));
        assert!(!registry.fail(0, ClientError::Cancelled));
    }
}
