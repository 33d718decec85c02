//! Limits a relayed MQTT publish has to satisfy before a broker is contacted.

use crate::error::PublishError;

/// Plain TCP broker port.
pub const MQTT_PORT: u16 = 1883;
/// Broker WebSocket port, substituted for [`MQTT_PORT`] on the primary attempt.
pub const MQTT_WS_PORT: u16 = 9001;

/// Upper bound of the two byte topic length field.
pub const MAX_TOPIC_LEN: usize = u16::MAX as usize;
/// Largest payload a relay will publish.
pub const MAX_PAYLOAD_LEN: usize = 4096;

/// Port used for the first delivery attempt.
pub fn candidate_port(port: u16) -> u16 {
    if port == MQTT_PORT {
        MQTT_WS_PORT
    } else {
        port
    }
}

pub fn validate_topic(topic: &str) -> Result<(), PublishError> {
    if topic.is_empty() {
        return Err(PublishError::EmptyTopic);
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(PublishError::TopicTooLong(topic.len()));
    }
    if topic.contains(['+', '#']) {
        return Err(PublishError::InvalidTopic(
            "wildcards are not allowed when publishing".to_owned(),
        ));
    }
    if topic.contains('\0') {
        return Err(PublishError::InvalidTopic("contains NUL".to_owned()));
    }
    Ok(())
}

pub fn validate_payload(payload: &[u8]) -> Result<(), PublishError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PublishError::PayloadTooLong(payload.len()));
    }
    Ok(())
}
