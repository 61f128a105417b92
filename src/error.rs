use std::{error::Error, fmt, io, sync::Arc};

use crate::packets::{conn_ack_packet::ConnectReturnCode, PacketError};

/// Errors surfaced by the client, either directly from an operation or through a completion.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// A packet could not be framed or parsed. The connection should be considered unusable.
    Protocol(PacketError),
    /// The broker answered CONNECT with a non-zero return code.
    ConnectionRejected(ConnectReturnCode),
    /// The transport closed before the request was acknowledged.
    TransportClosed,
    /// The transport failed to send or reported an error.
    Transport(Arc<io::Error>),
    InvalidTopic(String),
    InvalidConfig(String),
    /// Every packet identifier is waiting for an acknowledgment.
    IdentifiersExhausted,
    /// A newer request was registered under the same packet identifier.
    Superseded(u16),
    /// The completion can no longer be fulfilled.
    Cancelled,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "Protocol Error: {e}"),
            Self::ConnectionRejected(code) => write!(f, "Connection Rejected: {code}"),
            Self::TransportClosed => write!(f, "Transport Closed"),
            Self::Transport(e) => write!(f, "Transport Error: {e}"),
            Self::InvalidTopic(reason) => write!(f, "Invalid Topic: {reason}"),
            Self::InvalidConfig(reason) => write!(f, "Invalid Config: {reason}"),
            Self::IdentifiersExhausted => write!(f, "No packet identifier available"),
            Self::Superseded(packet_id) => {
                write!(f, "Request superseded by a newer one with packet identifier {packet_id}")
            }
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<PacketError> for ClientError {
    fn from(e: PacketError) -> Self {
        Self::Protocol(e)
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        Self::Transport(Arc::new(e))
    }
}
