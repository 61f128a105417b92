use crate::{ack_registry::AckRegistry, error::ClientError};

/// Hands out packet identifiers for requests that expect an acknowledgment.
///
/// Identifiers run from 1 to 65535 and wrap back to 1. 0 is the CONNECT handshake and is
/// never returned. Identifiers still waiting in the registry are skipped.
#[derive(Debug)]
pub struct PacketIdAllocator {
    next: u16,
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl PacketIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start allocating from `packet_id` (0 is treated as 1).
    pub fn starting_at(packet_id: u16) -> Self {
        Self { next: packet_id.max(1) }
    }

    /// # Errors
    /// - Returns `ClientError::IdentifiersExhausted` when every identifier is pending.
    pub fn allocate(&mut self, in_flight: &AckRegistry) -> Result<u16, ClientError> {
        for _ in 0..u16::MAX {
            let candidate = self.next;
            self.next = if candidate == u16::MAX { 1 } else { candidate + 1 };

            if !in_flight.contains(candidate) {
                return Ok(candidate);
            }
        }

        Err(ClientError::IdentifiersExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PacketType;

    #[test]
    fn starts_at_one_and_increments() {
        let registry = AckRegistry::new();
        let mut ids = PacketIdAllocator::new();

        assert_eq!(ids.allocate(&registry).unwrap(), 1);
        assert_eq!(ids.allocate(&registry).unwrap(), 2);
        assert_eq!(ids.allocate(&registry).unwrap(), 3);
    }

    #[test]
    fn wraps_past_max_without_zero() {
        let registry = AckRegistry::new();
        let mut ids = PacketIdAllocator::starting_at(u16::MAX);

        assert_eq!(ids.allocate(&registry).unwrap(), u16::MAX);
        assert_eq!(ids.allocate(&registry).unwrap(), 1);
    }

    #[test]
    fn skips_pending_identifiers() {
        let mut registry = AckRegistry::new();
        let _one = registry.register(1, PacketType::PubAck);
        let _two = registry.register(2, PacketType::PubAck);
        let mut ids = PacketIdAllocator::starting_at(u16::MAX);

        assert_eq!(ids.allocate(&registry).unwrap(), u16::MAX);
        assert_eq!(ids.allocate(&registry).unwrap(), 3);
    }

    #[test]
    fn exhausted_when_everything_is_pending() {
        let mut registry = AckRegistry::new();
        let pending: Vec<_> =
            (1..=u16::MAX).map(|id| registry.register(id, PacketType::PubAck)).collect();
        let mut ids = PacketIdAllocator::new();

        assert!(matches!(ids.allocate(&registry), Err(ClientError::IdentifiersExhausted)));
        drop(pending);
    }
}
