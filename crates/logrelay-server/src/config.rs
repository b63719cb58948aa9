//! Server configuration.

use std::time::Duration;

use logrelay_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Shared secret subscribers must present.
    pub ticket: String,
    /// Require every record field on ingress.
    pub strict_schema: bool,
    /// Records waiting for broadcast before ingress answers 503.
    pub broadcast_queue_capacity: usize,
    /// Outbound frames buffered per subscriber.
    pub send_queue_capacity: usize,
    /// Per-subscriber send timeout in milliseconds.
    pub send_timeout_ms: u64,
    /// Ping interval in milliseconds.
    pub ping_interval_ms: u64,
    /// Pong timeout in milliseconds.
    pub pong_timeout_ms: u64,
    /// Graceful shutdown budget in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl ServerConfig {
    /// Build a server config from loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            ticket: settings.ticket.clone(),
            strict_schema: settings.strict_schema,
            broadcast_queue_capacity: settings.broadcast_queue_capacity,
            send_queue_capacity: settings.send_queue_capacity,
            send_timeout_ms: settings.send_timeout_ms,
            ping_interval_ms: settings.ping_interval_ms,
            pong_timeout_ms: settings.pong_timeout_ms,
            shutdown_timeout_ms: settings.shutdown_timeout_ms,
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-subscriber send timeout.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Interval between server pings.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Silence after which a subscriber is dropped.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    /// Graceful shutdown budget.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ..Self::from_settings(&ServerSettings::default())
        }
    }
}

// The ticket is a secret; keep it out of `{:?}` output.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ticket", &"<redacted>")
            .field("strict_schema", &self.strict_schema)
            .field("broadcast_queue_capacity", &self.broadcast_queue_capacity)
            .field("send_queue_capacity", &self.send_queue_capacity)
            .field("send_timeout_ms", &self.send_timeout_ms)
            .field("ping_interval_ms", &self.ping_interval_ms)
            .field("pong_timeout_ms", &self.pong_timeout_ms)
            .field("shutdown_timeout_ms", &self.shutdown_timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.ticket, "debug_console_auth");
        assert!(!cfg.strict_schema);
    }

    #[test]
    fn from_settings_copies_values() {
        let settings = ServerSettings {
            port: 9000,
            strict_schema: true,
            send_timeout_ms: 250,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9000");
        assert!(cfg.strict_schema);
        assert_eq!(cfg.send_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn durations() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.ping_interval(), Duration::from_secs(30));
        assert_eq!(cfg.pong_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn debug_redacts_ticket() {
        let cfg = ServerConfig {
            ticket: "hunter2".into(),
            ..ServerConfig::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.broadcast_queue_capacity, cfg.broadcast_queue_capacity);
    }
}
