use bytes::Bytes;

use crate::{
    constants::{CLIENT_ID_PREFIX, DEFAULT_KEEP_ALIVE, MAX_STRING_LENGTH},
    error::ClientError,
    protocol::{
        validation::{validate_topic_name, validate_utf8_string},
        QoS,
    },
};

/// User name and optional password sent in CONNECT.
///
/// MQTT 3.1.1 does not allow a password without a user name, so the password lives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<Bytes>,
}

/// Message the broker publishes on the client's behalf if the connection drops uncleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// Settings for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    client_id: String,
    clean_session: bool,
    /// Advisory only, the ping schedule is owned by whoever drives the transport.
    keep_alive: u16,
    credentials: Option<Credentials>,
    will: Option<LastWill>,
}

impl ConnectionConfig {
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn will(&self) -> Option<&LastWill> {
        self.will.as_ref()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            client_id: generate_client_id(),
            clean_session: true,
            keep_alive: DEFAULT_KEEP_ALIVE,
            credentials: None,
            will: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    client_id: Option<String>,
    clean_session: Option<bool>,
    keep_alive: Option<u16>,
    credentials: Option<Credentials>,
    will: Option<LastWill>,
}

impl ConnectionConfigBuilder {
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = Some(clean_session);
        self
    }

    pub fn keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = Some(seconds);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: Option<Bytes>) -> Self {
        self.credentials = Some(Credentials { username: username.into(), password });
        self
    }

    pub fn will(mut self, will: LastWill) -> Self {
        self.will = Some(will);
        self
    }

    /// Validate and build the configuration.
    ///
    /// A client identifier is generated when none was given.
    ///
    /// # Errors
    /// - Returns `ClientError::InvalidConfig` if:
    ///   - The client identifier is empty while clean session is off.
    ///   - A string or binary field does not fit a 16-bit length.
    ///   - The will topic is not a valid topic name.
    pub fn build(self) -> Result<ConnectionConfig, ClientError> {
        let clean_session = self.clean_session.unwrap_or(true);
        let client_id = self.client_id.unwrap_or_else(generate_client_id);

        validate_utf8_string(&client_id)
            .map_err(|reason| ClientError::InvalidConfig(format!("client identifier {reason}")))?;

        // A zero-byte client identifier is only allowed together with a clean session
        if client_id.is_empty() && !clean_session {
            return Err(ClientError::InvalidConfig(
                "An empty client identifier requires a clean session".to_string(),
            ));
        }

        if let Some(ref credentials) = self.credentials {
            validate_utf8_string(&credentials.username)
                .map_err(|reason| ClientError::InvalidConfig(format!("user name {reason}")))?;

            if let Some(ref password) = credentials.password {
                check_binary_len("password", password)?;
            }
        }

        if let Some(ref will) = self.will {
            validate_topic_name(&will.topic).map_err(|e| {
                ClientError::InvalidConfig(format!("will topic is not a valid topic name: {e}"))
            })?;
            check_binary_len("will payload", &will.payload)?;
        }

        Ok(ConnectionConfig {
            client_id,
            clean_session,
            keep_alive: self.keep_alive.unwrap_or(DEFAULT_KEEP_ALIVE),
            credentials: self.credentials,
            will: self.will,
        })
    }
}

fn check_binary_len(field: &str, value: &[u8]) -> Result<(), ClientError> {
    if value.len() > MAX_STRING_LENGTH {
        return Err(ClientError::InvalidConfig(format!(
            "{field} length {} exceeds the maximum of {MAX_STRING_LENGTH} bytes",
            value.len()
        )));
    }

    Ok(())
}

fn generate_client_id() -> String {
    format!("{CLIENT_ID_PREFIX}{}", hex::encode(rand::random::<[u8; 4]>()))
}
