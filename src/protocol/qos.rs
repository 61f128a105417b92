use std::fmt;

/// Quality of Service levels for MQTT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QoS {
    /// Fire and forget. No packet identifier, no acknowledgment.
    #[default]
    AtMostOnce = 0,

    /// Acknowledged with PUBACK.
    AtLeastOnce = 1,

    /// Acknowledged with the PUBREC/PUBREL/PUBCOMP exchange.
    ExactlyOnce = 2,
}

impl QoS {
    /// Converts a numeric value to a `QoS`.
    ///
    /// Returns `None` for 3 and above.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    /// Converts the `QoS` to its numeric value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Whether deliveries at this level carry a packet identifier.
    pub fn needs_packet_id(self) -> bool {
        self != Self::AtMostOnce
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS {}", self.to_u8())
    }
}
