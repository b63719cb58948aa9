//! Subscriber sessions: connection state, registry, fan-out and lifecycle.

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod session;
pub mod upgrade;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use connection::{SessionId, SubscriberConnection};
pub use registry::ConnectionRegistry;
