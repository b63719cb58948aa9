//! Wire records and their decoded form.
//!
//! A [`LogRecord`] wraps the JSON object a producer posted. Fields the relay
//! does not know about are kept and forwarded untouched. Subscribers turn a
//! record into a [`DecodedRecord`] before display.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{RecordError, Result};
use crate::level::LogLevel;
use crate::timestamp::{TimestampInput, now_seconds};

/// Fields every record must carry when strict schema checking is enabled.
pub const REQUIRED_FIELDS: [&str; 6] = ["timestamp", "file", "function", "line_no", "level", "message"];

/// Encode message text for transport.
pub fn encode_message(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decode a transported message back to text.
pub fn decode_message(encoded: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| RecordError::InvalidMessage(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RecordError::InvalidMessage(e.to_string()))
}

/// A log record as posted by a producer and broadcast to subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRecord {
    fields: Map<String, Value>,
}

impl LogRecord {
    /// Build a record stamped with the current time.
    ///
    /// `message` is plain text; it is encoded here.
    pub fn new(level: LogLevel, file: &str, function: &str, line_no: u32, message: &str) -> Self {
        let mut fields = Map::new();
        let _ = fields.insert("timestamp".into(), Value::from(now_seconds()));
        let _ = fields.insert("file".into(), Value::from(file));
        let _ = fields.insert("function".into(), Value::from(function));
        let _ = fields.insert("line_no".into(), Value::from(line_no));
        let _ = fields.insert("level".into(), Value::from(level.as_str()));
        let _ = fields.insert("message".into(), Value::from(encode_message(message)));
        Self { fields }
    }

    /// Wrap an arbitrary JSON value; only objects are records.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(RecordError::NotAnObject),
        }
    }

    /// Parse a record from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    /// The underlying JSON object.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Required fields absent from this record, in schema order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .into_iter()
            .filter(|name| !self.fields.contains_key(*name))
            .collect()
    }

    /// The record level. Absent or unrecognized levels are errors.
    pub fn level(&self) -> Result<LogLevel> {
        match self.fields.get("level") {
            Some(Value::String(name)) => name.parse(),
            Some(other) => Err(RecordError::InvalidLevel(other.to_string())),
            None => Err(RecordError::InvalidLevel("<missing>".into())),
        }
    }

    /// Timestamp in seconds, or `None` when the record carries none.
    pub fn timestamp_seconds(&self) -> Result<Option<f64>> {
        self.fields
            .get("timestamp")
            .map(TimestampInput::normalize)
            .transpose()
    }

    /// Insert `now` as the timestamp if the record has none.
    pub fn stamp_if_missing(&mut self, now: f64) {
        let _ = self
            .fields
            .entry("timestamp")
            .or_insert_with(|| Value::from(now));
    }

    /// Decoded message text. An absent message decodes to an empty string.
    pub fn message_text(&self) -> Result<String> {
        match self.fields.get("message") {
            Some(Value::String(encoded)) => decode_message(encoded),
            Some(other) => Err(RecordError::InvalidMessage(format!(
                "expected base64 string, got {other}"
            ))),
            None => Ok(String::new()),
        }
    }

    /// Check the record is fit for broadcast.
    ///
    /// Level, message encoding and timestamp are always checked. With
    /// `strict` set every field in [`REQUIRED_FIELDS`] must also be present.
    pub fn validate(&self, strict: bool) -> Result<()> {
        if strict {
            if let Some(missing) = self.missing_fields().into_iter().next() {
                return Err(RecordError::MissingField(missing));
            }
        }
        let _ = self.level()?;
        let _ = self.message_text()?;
        let _ = self.timestamp_seconds()?;
        Ok(())
    }

    /// Decode into a display-ready record.
    ///
    /// A missing timestamp falls back to the current time.
    pub fn decode(&self) -> Result<DecodedRecord> {
        Ok(DecodedRecord {
            timestamp: self.timestamp_seconds()?.unwrap_or_else(now_seconds),
            level: self.level()?,
            file: self.display_field("file"),
            function: self.display_field("function"),
            line_no: self.display_field("line_no"),
            message: self.message_text()?,
        })
    }

    fn display_field(&self, name: &str) -> String {
        match self.fields.get(name) {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => "-".into(),
            Some(other) => other.to_string(),
        }
    }
}

/// A record ready for display.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedRecord {
    /// Seconds since the epoch.
    pub timestamp: f64,
    /// Record level.
    pub level: LogLevel,
    /// Source file.
    pub file: String,
    /// Function name.
    pub function: String,
    /// Line number.
    pub line_no: String,
    /// Decoded message text.
    pub message: String,
}

impl DecodedRecord {
    /// Timestamp as a UTC date-time, if it is within chrono's range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9).round().clamp(0.0, 999_999_999.0);
        DateTime::from_timestamp(secs as i64, nanos as u32)
    }
}
