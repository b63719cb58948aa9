//! Settings types.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Relay server settings.
    pub server: ServerSettings,
    /// Subscriber and producer client settings.
    pub client: ClientSettings,
    /// Process logging settings.
    pub logging: LoggingSettings,
}

/// Relay server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Shared secret subscribers present as `?auth=`.
    pub ticket: String,
    /// Require all six record fields on ingress.
    pub strict_schema: bool,
    /// Records waiting for broadcast before ingress answers 503.
    pub broadcast_queue_capacity: usize,
    /// Outbound frames buffered per subscriber.
    pub send_queue_capacity: usize,
    /// How long one subscriber may stall a broadcast pass.
    pub send_timeout_ms: u64,
    /// Interval between server pings.
    pub ping_interval_ms: u64,
    /// Drop a subscriber after this long without a pong.
    pub pong_timeout_ms: u64,
    /// Grace period for in-flight work on shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 60721,
            ticket: "debug_console_auth".to_string(),
            strict_schema: false,
            broadcast_queue_capacity: 1024,
            send_queue_capacity: 256,
            send_timeout_ms: 2_000,
            ping_interval_ms: 30_000,
            pong_timeout_ms: 60_000,
            shutdown_timeout_ms: 10_000,
        }
    }
}

/// Subscriber and producer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// WebSocket endpoint of the relay.
    pub relay_url: String,
    /// Ticket presented on every connection attempt.
    pub ticket: String,
    /// Fixed delay before reconnecting.
    pub backoff_ms: u64,
    /// HTTP ingress endpoint used by producers.
    pub producer_url: String,
    /// How long a producer stops posting after a failed request.
    pub producer_cooldown_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:60721/ws".to_string(),
            ticket: "debug_console_auth".to_string(),
            backoff_ms: 5_000,
            producer_url: "http://localhost:60721/log".to_string(),
            producer_cooldown_ms: 60_000,
        }
    }
}

/// Process logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
