//! Concurrent set of live subscriber sessions.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::connection::{SessionId, SubscriberConnection};

/// Tracks registered subscribers.
///
/// Broadcast passes iterate a [`snapshot`](Self::snapshot), so membership can
/// change while a pass is running.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<SessionId, Arc<SubscriberConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session.
    pub fn register(&self, connection: Arc<SubscriberConnection>) {
        debug!(session_id = %connection.id, client_ip = %connection.client_ip, "session registered");
        let _ = self.sessions.insert(connection.id.clone(), connection);
    }

    /// Remove a session. Returns the removed entry, `None` if it was already gone.
    pub fn unregister(&self, id: &SessionId) -> Option<Arc<SubscriberConnection>> {
        let removed = self.sessions.remove(id).map(|(_, conn)| conn);
        if removed.is_some() {
            debug!(session_id = %id, "session unregistered");
        }
        removed
    }

    /// Point-in-time copy of the membership.
    pub fn snapshot(&self) -> Vec<Arc<SubscriberConnection>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close and remove every session.
    pub fn close_all(&self, code: u16) -> usize {
        let members = self.snapshot();
        for conn in &members {
            conn.close(code);
            let _ = self.unregister(&conn.id);
        }
        members.len()
    }
}
