use crate::{constants::MAX_STRING_LENGTH, error::ClientError};

/// Validates a UTF-8 string based on MQTT protocol requirements.
///
/// Reference: <https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718016>
///
/// **Requirements:**
/// - Length must be ≤ `MAX_STRING_LENGTH`.
/// - Must not contain U+0000.
///
/// Returns the reason as a string so callers can wrap it in the error they surface.
pub(crate) fn validate_utf8_string(value: &str) -> Result<(), String> {
    let len = value.len();
    if len > MAX_STRING_LENGTH {
        return Err(format!("length {len} exceeds the maximum of {MAX_STRING_LENGTH} bytes"));
    }

    if value.contains('\0') {
        return Err("contains the null character".to_string());
    }

    Ok(())
}

/// Validates a topic name used to publish.
///
/// Topic names must be non-empty and must not contain the wildcards `+` or `#`.
pub(crate) fn validate_topic_name(topic: &str) -> Result<(), ClientError> {
    validate_utf8_string(topic).map_err(ClientError::InvalidTopic)?;

    if topic.is_empty() {
        return Err(ClientError::InvalidTopic("topic name is empty".to_string()));
    }

    if topic.contains(['+', '#']) {
        return Err(ClientError::InvalidTopic(format!("topic name {topic} contains a wildcard")));
    }

    Ok(())
}

/// Validates a topic filter used to subscribe or unsubscribe.
pub(crate) fn validate_topic_filter(filter: &str) -> Result<(), ClientError> {
    validate_utf8_string(filter).map_err(ClientError::InvalidTopic)?;

    if filter.is_empty() {
        return Err(ClientError::InvalidTopic("topic filter is empty".to_string()));
    }

    Ok(())
}
