//! Record fan-out to registered subscribers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use logrelay_core::LogRecord;
use metrics::{counter, histogram};
use tracing::{debug, error, warn};

use super::connection::{CLOSE_POLICY, DeliveryError, SubscriberConnection};
use super::registry::ConnectionRegistry;
use crate::metrics::{BROADCAST_PASS_DURATION_SECONDS, WS_BROADCAST_DROPS_TOTAL};

/// Outcome of one broadcast pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions in the snapshot.
    pub recipients: usize,
    /// Sessions that accepted the frame.
    pub delivered: usize,
    /// Sessions that failed and were removed.
    pub failed: usize,
}

/// Sends each record to every registered session.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Serialize `record` once and send it to every registered session.
    pub async fn broadcast(&self, record: &LogRecord) -> BroadcastReport {
        match record.to_json() {
            Ok(json) => self.broadcast_frame(Arc::from(json)).await,
            Err(e) => {
                error!(error = %e, "failed to serialize record, skipping broadcast");
                BroadcastReport::default()
            }
        }
    }

    /// Send a pre-serialized frame to every session in a membership snapshot.
    ///
    /// Sends run concurrently. A session whose send fails or stalls past the
    /// send timeout is closed and unregistered; the rest are unaffected.
    pub async fn broadcast_frame(&self, frame: Arc<str>) -> BroadcastReport {
        let started = Instant::now();
        let members = self.registry.snapshot();
        let timeout = self.send_timeout;

        let sends = members.iter().map(|conn| {
            let frame = Arc::clone(&frame);
            async move { (conn, conn.deliver(frame, timeout).await) }
        });
        let results = join_all(sends).await;

        let mut report = BroadcastReport {
            recipients: members.len(),
            ..BroadcastReport::default()
        };
        for (conn, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    self.evict(conn, &e);
                }
            }
        }

        histogram!(BROADCAST_PASS_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(
            recipients = report.recipients,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast pass complete"
        );
        report
    }

    fn evict(&self, conn: &SubscriberConnection, cause: &DeliveryError) {
        counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
        // Only the pass that removed the session reports it.
        if self.registry.unregister(&conn.id).is_some() {
            warn!(
                session_id = %conn.id,
                client_ip = %conn.client_ip,
                error = %cause,
                dropped = conn.drop_count(),
                "delivery failed, removing subscriber"
            );
        }
        conn.close(CLOSE_POLICY);
    }
}
