//! # logrelay-client
//!
//! Both ends of the relay that live outside the server:
//!
//! - [`SubscriberClient`]: holds a subscription open, reconnecting after a
//!   fixed backoff, and hands every decoded record to a [`RecordSink`]
//! - [`ConsoleSink`]: plain-text renderer for terminals and files
//! - [`RelayLogger`]: producer that posts records to the relay over HTTP

#![deny(unsafe_code)]

pub mod errors;
pub mod producer;
pub mod sink;
pub mod subscriber;
pub mod transport;

pub use errors::ClientError;
pub use producer::{ProducerConfig, RecordHandler, RelayLogger};
pub use sink::{ConsoleSink, RecordSink};
pub use subscriber::{ClientState, RunSummary, SubscriberClient, SubscriberConfig};
pub use transport::{Connector, Frame, Transport, WsConnector};
