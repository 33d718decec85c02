use std::error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementError {
    NotANumber(&'static str, std::string::String),
    NotFinite(&'static str),
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeasurementError::NotANumber(field, raw) => {
                write!(f, "Invalid number for {}: {:?}", field, raw)
            }
            MeasurementError::NotFinite(field) => write!(f, "Non-finite value for {}", field),
        }
    }
}

impl error::Error for MeasurementError {}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishError {
    EmptyTopic,
    InvalidTopic(std::string::String),
    TopicTooLong(usize),
    PayloadTooLong(usize),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PublishError::EmptyTopic => write!(f, "Topic must not be empty"),
            PublishError::InvalidTopic(msg) => write!(f, "Invalid topic: {}", msg),
            PublishError::TopicTooLong(len) => write!(
                f,
                "Topic is {} bytes, limit is {}",
                len,
                crate::publish::MAX_TOPIC_LEN
            ),
            PublishError::PayloadTooLong(len) => write!(
                f,
                "Payload is {} bytes, limit is {}",
                len,
                crate::publish::MAX_PAYLOAD_LEN
            ),
        }
    }
}

impl error::Error for PublishError {}
