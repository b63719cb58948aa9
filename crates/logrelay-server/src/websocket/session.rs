//! Subscriber session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use super::connection::{CLOSE_GOING_AWAY, CLOSE_POLICY, SubscriberConnection};
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// How long the writer gets to flush a close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Per-session tuning taken from [`ServerConfig`].
#[derive(Clone, Copy, Debug)]
pub struct SessionSettings {
    /// Outbound frames buffered for this session.
    pub send_queue_capacity: usize,
    /// Interval between pings.
    pub ping_interval: Duration,
    /// Silence after which the session is dropped.
    pub pong_timeout: Duration,
}

impl SessionSettings {
    /// Extract session settings from the server config.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            send_queue_capacity: config.send_queue_capacity.max(1),
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
        }
    }
}

/// Run a subscriber session for an upgraded socket.
///
/// 1. Registers the session so broadcast passes include it
/// 2. Forwards queued frames to the socket and pings on an interval
/// 3. Ignores inbound frames apart from liveness bookkeeping
/// 4. Ends on close, transport error, eviction, pong timeout or shutdown
/// 5. Always unregisters before returning
#[instrument(skip_all, fields(client_ip = %client_ip, session_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_ip: String,
    registry: Arc<ConnectionRegistry>,
    settings: SessionSettings,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<str>>(settings.send_queue_capacity);
    let connection = Arc::new(SubscriberConnection::new(client_ip.clone(), send_tx));
    let session_id = connection.id.clone();
    let _ = tracing::Span::current().record("session_id", tracing::field::display(&session_id));

    let connection_start = Instant::now();
    registry.register(connection.clone());
    info!(%client_ip, "subscriber connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let outbound_conn = connection.clone();
    let writer = async move {
        let mut ping_interval = tokio::time::interval(settings.ping_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if outbound_conn.last_pong_elapsed() > settings.pong_timeout {
                        warn!(timeout = ?settings.pong_timeout, "subscriber unresponsive, disconnecting");
                        outbound_conn.close(CLOSE_POLICY);
                        let frame = CloseFrame {
                            code: CLOSE_POLICY,
                            reason: Utf8Bytes::from_static("pong timeout"),
                        };
                        let _ = ws_tx.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_conn.closed() => {
                    let frame = CloseFrame {
                        code: outbound_conn.close_code(),
                        reason: Utf8Bytes::from_static(""),
                    };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    };
    let mut outbound = tokio::spawn(writer.in_current_span());

    let mut writer_done = false;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!("relay shutting down, closing subscriber");
                connection.close(CLOSE_GOING_AWAY);
                break;
            }
            () = connection.closed() => {
                debug!(code = connection.close_code(), "session closed by relay");
                break;
            }
            _ = &mut outbound => {
                writer_done = true;
                break;
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("subscriber closed the stream");
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => connection.mark_pong(),
                    Some(Ok(Message::Text(text))) => {
                        connection.mark_pong();
                        debug!(len = text.len(), "ignoring inbound text frame");
                    }
                    Some(Ok(Message::Binary(data))) => {
                        connection.mark_pong();
                        debug!(len = data.len(), "ignoring inbound binary frame");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "subscriber transport error");
                        break;
                    }
                }
            }
        }
    }

    // Clean up
    let _ = registry.unregister(&session_id);
    connection.close(connection.close_code());
    if !writer_done {
        let abort = outbound.abort_handle();
        if tokio::time::timeout(CLOSE_GRACE, outbound).await.is_err() {
            abort.abort();
        }
    }

    info!(
        %client_ip,
        dropped = connection.drop_count(),
        "subscriber disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
}
