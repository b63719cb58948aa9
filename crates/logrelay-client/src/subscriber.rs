//! Reconnecting subscriber.
//!
//! ```text
//! Disconnected → Connecting ─ok→ Connected ─close/error→ Backoff ─sleep→ Connecting
//!                    └─fail→ Backoff
//! any suspension point ─cancel→ Closing → Stopped
//! ```
//!
//! Every attempt presents the same ticket and User-Agent. Frames that fail to
//! decode are logged and dropped; the connection stays up.

use std::time::Duration;

use logrelay_core::LogRecord;
use logrelay_settings::ClientSettings;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::ClientError;
use crate::sink::RecordSink;
use crate::transport::{Connector, Frame, Transport, WsConnector, redact_query};

/// User-Agent sent on every connection attempt.
pub const USER_AGENT: &str = concat!("logrelay-tail/", env!("CARGO_PKG_VERSION"));

/// Subscriber lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Not started yet.
    Disconnected,
    /// Opening a transport.
    Connecting,
    /// Receiving records.
    Connected,
    /// Waiting before the next attempt.
    Backoff,
    /// Cancelled; closing any open transport.
    Closing,
    /// Finished for good.
    Stopped,
}

/// Subscriber configuration.
#[derive(Clone)]
pub struct SubscriberConfig {
    /// `WebSocket` endpoint of the relay, without the ticket.
    pub relay_url: String,
    /// Ticket presented as `?auth=`.
    pub ticket: String,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl SubscriberConfig {
    /// Build from loaded client settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            relay_url: settings.relay_url.clone(),
            ticket: settings.ticket.clone(),
            backoff: Duration::from_millis(settings.backoff_ms),
        }
    }

    /// Relay URL with the percent-encoded ticket appended.
    pub fn connect_url(&self) -> String {
        let separator = if self.relay_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}auth={}",
            self.relay_url,
            utf8_percent_encode(&self.ticket, NON_ALPHANUMERIC)
        )
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self::from_settings(&ClientSettings::default())
    }
}

impl std::fmt::Debug for SubscriberConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberConfig")
            .field("relay_url", &self.relay_url)
            .field("ticket", &"<redacted>")
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Counters for one [`SubscriberClient::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Successful connections.
    pub connections: u64,
    /// Records handed to the sink.
    pub records: u64,
    /// Frames dropped because they failed to decode.
    pub dropped: u64,
}

enum StreamEnd {
    Cancelled,
    Closed,
    Failed(ClientError),
}

/// Holds a subscription to the relay open until cancelled.
pub struct SubscriberClient<C = WsConnector> {
    config: SubscriberConfig,
    connector: C,
    state: watch::Sender<ClientState>,
}

impl SubscriberClient<WsConnector> {
    /// Subscriber using the `WebSocket` connector.
    pub fn new(config: SubscriberConfig) -> Self {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> SubscriberClient<C> {
    /// Subscriber using a custom connector.
    pub fn with_connector(config: SubscriberConfig, connector: C) -> Self {
        let (state, _) = watch::channel(ClientState::Disconnected);
        Self {
            config,
            connector,
            state,
        }
    }

    /// Watch state transitions.
    pub fn state(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Run until `cancel` fires, emitting decoded records to `sink`.
    pub async fn run<S: RecordSink>(&self, sink: &mut S, cancel: CancellationToken) -> RunSummary {
        let url = self.config.connect_url();
        let mut summary = RunSummary::default();

        loop {
            self.set_state(ClientState::Connecting);
            debug!(url = %redact_query(&url), "connecting to relay");

            let connected = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.set_state(ClientState::Closing);
                    break;
                }
                result = self.connector.connect(&url, USER_AGENT) => result,
            };

            match connected {
                Ok(mut transport) => {
                    summary.connections += 1;
                    self.set_state(ClientState::Connected);
                    info!(relay = %self.config.relay_url, "stream connected");

                    match self.pump(transport.as_mut(), sink, &cancel, &mut summary).await {
                        StreamEnd::Cancelled => {
                            self.set_state(ClientState::Closing);
                            warn!("closing the stream connection");
                            if let Err(e) = transport.close().await {
                                debug!(error = %e, "close handshake failed");
                            }
                            break;
                        }
                        StreamEnd::Closed => info!("relay closed the stream"),
                        StreamEnd::Failed(e) => warn!(error = %e, "stream connection lost"),
                    }
                }
                Err(e) => warn!(error = %e, "failed to connect to relay"),
            }

            self.set_state(ClientState::Backoff);
            warn!(
                backoff_ms = u64::try_from(self.config.backoff.as_millis()).unwrap_or(u64::MAX),
                "reconnecting after backoff"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.set_state(ClientState::Closing);
                    break;
                }
                () = tokio::time::sleep(self.config.backoff) => {}
            }
        }

        self.set_state(ClientState::Stopped);
        info!(
            connections = summary.connections,
            records = summary.records,
            dropped = summary.dropped,
            "stream connection stopped"
        );
        summary
    }

    async fn pump<S: RecordSink>(
        &self,
        transport: &mut dyn Transport,
        sink: &mut S,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> StreamEnd {
        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => return StreamEnd::Cancelled,
                frame = transport.next_frame() => frame,
            };
            match frame {
                None | Some(Ok(Frame::Close)) => return StreamEnd::Closed,
                Some(Err(e)) => return StreamEnd::Failed(e),
                Some(Ok(Frame::Text(text))) => {
                    match LogRecord::from_json(&text).and_then(|record| record.decode()) {
                        Ok(decoded) => {
                            summary.records += 1;
                            sink.emit(&decoded);
                        }
                        Err(e) => {
                            summary.dropped += 1;
                            error!(error = %e, "dropping undecodable record");
                        }
                    }
                }
            }
        }
    }

    fn set_state(&self, next: ClientState) {
        let _ = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = ?*current, to = ?next, "subscriber state");
            *current = next;
            true
        });
    }
}
