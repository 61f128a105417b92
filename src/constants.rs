/// Protocol name.
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Largest value the remaining length field can carry (4 bytes, 7 bits each).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Maximum number of bytes used by an encoded remaining length.
pub const MAX_REMAINING_LENGTH_BYTES: usize = 4;

/// Maximum allowed length for a UTF-8 encoded string.
pub const MAX_STRING_LENGTH: usize = 65_535;

/// Identifier reserved for the CONNECT/CONNACK handshake.
///
/// Application identifiers start at 1, so this never collides with a real packet identifier.
pub const CONNECT_ACK_ID: u16 = 0;

/// Initial capacity of the receive buffer.
pub(crate) const RECEIVE_BUFFER_CAPACITY: usize = 4096;

/// Default keep alive interval in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 60;

/// Prefix used for generated client identifiers.
pub(crate) const CLIENT_ID_PREFIX: &str = "mqtt_";
