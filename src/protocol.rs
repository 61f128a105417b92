pub mod decoding;
pub mod encoding;
pub mod packet_type;
pub mod qos;
pub(crate) mod validation;

pub use packet_type::PacketType;
pub use qos::QoS;
