//! Bounded broadcast queue and its dispatcher task.
//!
//! Ingress never waits on subscribers: it pushes the record onto a bounded
//! queue and returns. A single dispatcher drains the queue in FIFO order and
//! runs one broadcast pass per record, so records are broadcast in the order
//! they were accepted.

use std::sync::Arc;

use logrelay_core::LogRecord;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::websocket::Broadcaster;

/// Why a record could not be queued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity.
    #[error("broadcast queue is full")]
    Full,
    /// The dispatcher has stopped.
    #[error("broadcast dispatcher has stopped")]
    Closed,
}

/// Producer side of the broadcast queue.
#[derive(Clone)]
pub struct BroadcastQueue {
    tx: mpsc::Sender<LogRecord>,
}

impl BroadcastQueue {
    /// Create a queue holding at most `capacity` records.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a record without waiting.
    pub fn enqueue(&self, record: LogRecord) -> Result<(), EnqueueError> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Records waiting for the dispatcher.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Spawn the dispatcher that drains `rx` into `broadcaster`.
///
/// Stops when `shutdown` is cancelled or every [`BroadcastQueue`] is dropped.
pub fn spawn_dispatcher(
    rx: mpsc::Receiver<LogRecord>,
    broadcaster: Arc<Broadcaster>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_dispatcher(rx, broadcaster, shutdown))
}

async fn run_dispatcher(
    mut rx: mpsc::Receiver<LogRecord>,
    broadcaster: Arc<Broadcaster>,
    shutdown: CancellationToken,
) {
    debug!("broadcast dispatcher started");
    loop {
        let record = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            record = rx.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };
        let _ = broadcaster.broadcast(&record).await;
    }
    info!(discarded = rx.len(), "broadcast dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use logrelay_core::LogLevel;

    use super::*;
    use crate::websocket::{ConnectionRegistry, SubscriberConnection};

    fn record(line: u32) -> LogRecord {
        LogRecord::new(LogLevel::Debug, "worker.rs", "run", line, "tick")
    }

    #[test]
    fn full_queue_is_reported() {
        let (queue, _rx) = BroadcastQueue::new(2);
        queue.enqueue(record(1)).unwrap();
        queue.enqueue(record(2)).unwrap();
        assert_eq!(queue.pending(), 2);
        assert_eq!(queue.enqueue(record(3)), Err(EnqueueError::Full));
    }

    #[test]
    fn closed_queue_is_reported() {
        let (queue, rx) = BroadcastQueue::new(2);
        drop(rx);
        assert_eq!(queue.enqueue(record(1)), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn dispatcher_preserves_fifo_order() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut sub_rx) = mpsc::channel(16);
        registry.register(Arc::new(SubscriberConnection::new("127.0.0.1", tx)));
        let broadcaster = Arc::new(Broadcaster::new(registry, Duration::from_secs(1)));

        let (queue, rx) = BroadcastQueue::new(16);
        let shutdown = CancellationToken::new();
        let handle = spawn_dispatcher(rx, broadcaster, shutdown.clone());

        for line in 1..=5 {
            queue.enqueue(record(line)).unwrap();
        }
        for line in 1..=5 {
            let frame = sub_rx.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(value["line_no"], line);
        }

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn dispatcher_stops_when_queue_dropped() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry, Duration::from_secs(1)));
        let (queue, rx) = BroadcastQueue::new(4);
        let handle = spawn_dispatcher(rx, broadcaster, CancellationToken::new());

        drop(queue);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
