//! Timestamp normalization.
//!
//! Producers send timestamps in several shapes. Every shape is first
//! classified into a [`TimestampInput`] and then converted to seconds since
//! the Unix epoch through a single conversion.
//!
//! Whole numbers with more than [`SECONDS_DIGIT_LIMIT`] decimal digits are
//! treated as milliseconds. A value with a fractional part is always seconds.

use serde_json::Value;

use crate::errors::{RecordError, Result};

/// Whole numbers with more digits than this are milliseconds.
pub const SECONDS_DIGIT_LIMIT: u32 = 10;

/// A classified timestamp, before conversion to seconds.
#[derive(Clone, Debug, PartialEq)]
pub enum TimestampInput {
    /// Whole seconds since the epoch.
    IntegerSeconds(i64),
    /// Whole milliseconds since the epoch.
    IntegerMillis(i64),
    /// Seconds with a fractional component.
    FloatSeconds(f64),
    /// A string holding an integer or decimal number.
    NumericString(String),
}

impl TimestampInput {
    /// Classify a JSON value.
    ///
    /// Numbers and numeric strings are accepted. Anything else (booleans,
    /// `null`, objects, free text) is an [`RecordError::InvalidTimestamp`].
    pub fn classify(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::from_integer(i))
                } else if n.is_u64() {
                    Err(RecordError::InvalidTimestamp(n.to_string()))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite())
                        .map(Self::FloatSeconds)
                        .ok_or_else(|| RecordError::InvalidTimestamp(n.to_string()))
                }
            }
            Value::String(s) if is_numeric_string(s) => Ok(Self::NumericString(s.clone())),
            other => Err(RecordError::InvalidTimestamp(other.to_string())),
        }
    }

    /// Apply the digit-count rule to a whole number.
    pub fn from_integer(value: i64) -> Self {
        if digit_count(value) > SECONDS_DIGIT_LIMIT {
            Self::IntegerMillis(value)
        } else {
            Self::IntegerSeconds(value)
        }
    }

    /// Convert to seconds since the epoch.
    pub fn to_seconds(&self) -> Result<f64> {
        match self {
            Self::IntegerSeconds(secs) => Ok(*secs as f64),
            Self::IntegerMillis(millis) => Ok(*millis as f64 / 1000.0),
            Self::FloatSeconds(secs) => Ok(*secs),
            Self::NumericString(s) => {
                if s.contains('.') {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .ok_or_else(|| RecordError::InvalidTimestamp(s.clone()))
                } else {
                    let whole = s
                        .parse::<i64>()
                        .map_err(|_| RecordError::InvalidTimestamp(s.clone()))?;
                    Self::from_integer(whole).to_seconds()
                }
            }
        }
    }

    /// Classify and convert in one step.
    pub fn normalize(value: &Value) -> Result<f64> {
        Self::classify(value)?.to_seconds()
    }
}

/// Current wall-clock time in seconds since the epoch, with microsecond precision.
pub fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Number of decimal digits, ignoring the sign.
fn digit_count(value: i64) -> u32 {
    value.unsigned_abs().checked_ilog10().map_or(1, |log| log + 1)
}

/// Digits with at most one decimal point, e.g. `"1700000000"` or `"1700000000.5"`.
fn is_numeric_string(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in s.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}
