//! Subscriber connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// The relay is going away.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// The subscriber was evicted after a failed delivery.
pub const CLOSE_POLICY: u16 = 1008;

/// Unique subscriber session ID.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh, time-ordered ID.
    pub fn new() -> Self {
        Self(format!("sub_{}", uuid::Uuid::now_v7()))
    }

    /// The ID as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a frame could not be handed to a subscriber.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The session's writer is gone.
    #[error("subscriber channel closed")]
    Closed,
    /// The outbound queue stayed full for the whole send timeout.
    #[error("subscriber stalled for {0:?}")]
    Stalled(Duration),
}

/// A registered subscriber.
pub struct SubscriberConnection {
    /// Unique session ID.
    pub id: SessionId,
    /// Best-effort client IP, for logs.
    pub client_ip: String,
    /// Send channel to the session's writer task.
    tx: mpsc::Sender<Arc<str>>,
    /// Cleared once the session is closing.
    is_alive: AtomicBool,
    /// When the last pong (or any inbound frame) arrived.
    last_pong: Mutex<Instant>,
    /// Deliveries that failed for this session.
    dropped_messages: AtomicU64,
    close_code: AtomicU16,
    closed: CancellationToken,
}

impl SubscriberConnection {
    /// Create a new connection.
    pub fn new(client_ip: impl Into<String>, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::new(),
            client_ip: client_ip.into(),
            tx,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            close_code: AtomicU16::new(CLOSE_NORMAL),
            closed: CancellationToken::new(),
        }
    }

    /// Queue a frame for the writer, waiting at most `timeout` for room.
    pub async fn deliver(&self, frame: Arc<str>, timeout: Duration) -> Result<(), DeliveryError> {
        if !self.is_alive() {
            return Err(DeliveryError::Closed);
        }
        let result = match tokio::time::timeout(timeout, self.tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::Stalled(timeout)),
        };
        if result.is_err() {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Ask the session to close its socket with `code`. Idempotent.
    pub fn close(&self, code: u16) {
        if self.is_alive.swap(false, Ordering::AcqRel) {
            self.close_code.store(code, Ordering::Release);
        }
        self.closed.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Close code requested for this session.
    pub fn close_code(&self) -> u16 {
        self.close_code.load(Ordering::Acquire)
    }

    /// Whether the session is still accepting frames.
    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Acquire)
    }

    /// Record inbound activity.
    pub fn mark_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Total failed deliveries for this session.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}
