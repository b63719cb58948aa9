//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render `/metrics`. Fails if a
/// recorder is already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Subscriber sessions opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Subscriber sessions closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active subscriber sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Lifetime of a subscriber session (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Rejected connect requests (counter, labels: reason).
pub const WS_AUTH_FAILURES_TOTAL: &str = "ws_auth_failures_total";
/// Deliveries that failed and evicted a session (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Records posted to `/log` (counter).
pub const LOG_RECORDS_RECEIVED_TOTAL: &str = "log_records_received_total";
/// Records refused with 400 (counter, labels: reason).
pub const LOG_RECORDS_REJECTED_TOTAL: &str = "log_records_rejected_total";
/// Records refused because the broadcast queue was full (counter).
pub const LOG_RECORDS_DROPPED_TOTAL: &str = "log_records_dropped_total";
/// Duration of one broadcast pass (histogram).
pub const BROADCAST_PASS_DURATION_SECONDS: &str = "broadcast_pass_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_recorder_renders_text() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(LOG_RECORDS_RECEIVED_TOTAL).increment(3);
        });
        let text = handle.render();
        assert!(text.contains("log_records_received_total 3"));
    }
}
