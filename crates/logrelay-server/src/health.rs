//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the relay is running.
    pub status: String,
    /// Seconds since the relay started.
    pub uptime_secs: u64,
    /// Registered subscriber sessions.
    pub connections: usize,
    /// Records waiting in the broadcast queue.
    pub queued_records: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, queued_records: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        queued_records,
    }
}
