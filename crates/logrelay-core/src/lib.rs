//! # logrelay-core
//!
//! Shared building blocks for the log relay:
//!
//! - [`LogLevel`]: the seven accepted record levels
//! - [`TimestampInput`]: tagged timestamp normalization (seconds vs. milliseconds)
//! - [`LogRecord`] / [`DecodedRecord`]: wire record and its decoded display form
//! - [`RecordError`]: validation failures
//! - [`logging`]: `tracing` subscriber setup and test capture helpers

#![deny(unsafe_code)]

pub mod errors;
pub mod level;
pub mod logging;
pub mod record;
pub mod timestamp;

pub use errors::{RecordError, Result};
pub use level::LogLevel;
pub use record::{DecodedRecord, LogRecord, REQUIRED_FIELDS, decode_message, encode_message};
pub use timestamp::{TimestampInput, now_seconds};
