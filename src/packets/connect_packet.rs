use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    config::{ConnectionConfig, Credentials, LastWill},
    constants::{PROTOCOL_LEVEL, PROTOCOL_NAME},
    protocol::{
        decoding::{decode_binary_data, decode_u16, decode_u8, decode_utf8_string},
        encoding::{write_binary_data, write_utf8_string},
        PacketType, QoS,
    },
};

use super::{build_packet, DecodablePacket, EncodablePacket, Packet, PacketError};

const USERNAME_FLAG: u8 = 0b1000_0000;
const PASSWORD_FLAG: u8 = 0b0100_0000;
const WILL_RETAIN_FLAG: u8 = 0b0010_0000;
const WILL_QOS_SHIFT: u8 = 3;
const WILL_FLAG: u8 = 0b0000_0100;
const CLEAN_SESSION_FLAG: u8 = 0b0000_0010;
const RESERVED_FLAG: u8 = 0b0000_0001;

/// Represents an MQTT 3.1.1 CONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    /// The Client Identifier identifies the Client to the Server.
    pub client_id: String,

    /// Specifies whether the Server discards any existing Session for this Client.
    pub clean_session: bool,

    /// Maximum interval in seconds between two control packets sent by the Client.
    pub keep_alive: u16,

    /// Will message, the Will flag is set iff this is present.
    pub will: Option<LastWill>,

    /// User name and password, the flags are set iff the fields are present.
    pub credentials: Option<Credentials>,
}

impl ConnectPacket {
    /// Compute the connect flags byte from the packet fields.
    pub fn connect_flags(&self) -> u8 {
        let mut flags = 0;

        if self.clean_session {
            flags |= CLEAN_SESSION_FLAG;
        }

        if let Some(ref will) = self.will {
            flags |= WILL_FLAG;
            flags |= will.qos.to_u8() << WILL_QOS_SHIFT;
            if will.retain {
                flags |= WILL_RETAIN_FLAG;
            }
        }

        if let Some(ref credentials) = self.credentials {
            flags |= USERNAME_FLAG;
            if credentials.password.is_some() {
                flags |= PASSWORD_FLAG;
            }
        }

        flags
    }
}

impl From<&ConnectionConfig> for ConnectPacket {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            client_id: config.client_id().to_string(),
            clean_session: config.clean_session(),
            keep_alive: config.keep_alive(),
            will: config.will().cloned(),
            credentials: config.credentials().cloned(),
        }
    }
}

impl Packet for ConnectPacket {
    fn packet_type() -> PacketType {
        PacketType::Connect
    }
}

impl EncodablePacket for ConnectPacket {
    fn encode(&self) -> Result<Bytes, PacketError> {
        // Variable header: protocol name, protocol level, connect flags, keep alive
        let mut variable_header = BytesMut::with_capacity(10);
        write_utf8_string(&mut variable_header, PROTOCOL_NAME)?;
        variable_header.put_u8(PROTOCOL_LEVEL);
        variable_header.put_u8(self.connect_flags());
        variable_header.put_u16(self.keep_alive);

        // Payload: client id, will topic, will message, user name, password
        let mut payload = BytesMut::new();
        write_utf8_string(&mut payload, &self.client_id)?;

        if let Some(ref will) = self.will {
            write_utf8_string(&mut payload, &will.topic)?;
            write_binary_data(&mut payload, &will.payload)?;
        }

        if let Some(ref credentials) = self.credentials {
            write_utf8_string(&mut payload, &credentials.username)?;
            if let Some(ref password) = credentials.password {
                write_binary_data(&mut payload, password)?;
            }
        }

        build_packet(Self::packet_type(), 0, &variable_header, &payload)
    }
}

impl DecodablePacket for ConnectPacket {
    fn decode(_flags: u8, mut body: Bytes) -> Result<Self, PacketError> {
        let protocol_name = decode_utf8_string(&mut body)?;
        if protocol_name != PROTOCOL_NAME {
            return Err(PacketError::MalformedPacket(Some(format!(
                "Unsupported protocol name: {protocol_name}"
            ))));
        }

        let protocol_level = decode_u8(&mut body)?;
        if protocol_level != PROTOCOL_LEVEL {
            return Err(PacketError::MalformedPacket(Some(format!(
                "Unsupported protocol level: {protocol_level}"
            ))));
        }

        let connect_flags = decode_u8(&mut body)?;

        // Reserved connect flag (last bit) must be set to 0
        if connect_flags & RESERVED_FLAG != 0 {
            return Err(PacketError::malformed("Connect flags are reserved"));
        }

        let clean_session = connect_flags & CLEAN_SESSION_FLAG != 0;
        let will_flag = connect_flags & WILL_FLAG != 0;
        let will_qos = connect_flags >> WILL_QOS_SHIFT & 0b0000_0011;
        let will_retain = connect_flags & WILL_RETAIN_FLAG != 0;
        let password_flag = connect_flags & PASSWORD_FLAG != 0;
        let username_flag = connect_flags & USERNAME_FLAG != 0;

        // If the will flag is set to 0, then will QoS and will retain must be set to 0
        if !will_flag && (will_retain || will_qos != 0) {
            return Err(PacketError::malformed("Will QoS and retain must be 0 without a will"));
        }

        let Some(will_qos) = QoS::from_u8(will_qos) else {
            return Err(PacketError::MalformedPacket(Some(format!(
                "Will QoS must be 0, 1 or 2. Got: {will_qos}"
            ))));
        };

        // A password can only be present together with a user name
        if password_flag && !username_flag {
            return Err(PacketError::malformed("Password flag set without user name flag"));
        }

        let keep_alive = decode_u16(&mut body)?;

        let client_id = decode_utf8_string(&mut body)?;

        let will = if will_flag {
            let topic = decode_utf8_string(&mut body)?;
            let payload = decode_binary_data(&mut body)?;
            Some(LastWill { topic, payload, qos: will_qos, retain: will_retain })
        } else {
            None
        };

        let credentials = if username_flag {
            let username = decode_utf8_string(&mut body)?;
            let password =
                if password_flag { Some(decode_binary_data(&mut body)?) } else { None };
            Some(Credentials { username, password })
        } else {
            None
        };

        Ok(Self { client_id, clean_session, keep_alive, will, credentials })
    }
}
