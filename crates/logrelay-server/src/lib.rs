//! # logrelay-server
//!
//! Axum HTTP + `WebSocket` log relay.
//!
//! - `POST /log`: validate a producer's record and queue it for broadcast
//! - `GET /ws?auth=<ticket>`: authenticate and register a subscriber
//! - Bounded broadcast queue drained by one dispatcher task (FIFO per relay)
//! - Fan-out over a registry snapshot with per-subscriber failure isolation
//! - Health and Prometheus endpoints, graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod health;
pub mod ingress;
pub mod landing;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::RelayServer;
