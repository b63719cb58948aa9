//! Record validation errors.

use thiserror::Error;

/// Reasons a log record can be refused by the relay or dropped by a subscriber.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The payload was valid JSON but not an object.
    #[error("record is not a JSON object")]
    NotAnObject,
    /// Strict mode requires every record field to be present.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// The level was absent or not one of the seven accepted names.
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
    /// The timestamp was neither a number nor a numeric string.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// The message was not base64-encoded UTF-8 text.
    #[error("invalid message encoding: {0}")]
    InvalidMessage(String),
    /// The payload could not be parsed or serialized as JSON.
    #[error("failed to parse record JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for record operations.
pub type Result<T> = std::result::Result<T, RecordError>;
