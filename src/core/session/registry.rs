//! Live session registry
//!
//! Maps session ids to the outbound handle of their connection. Background
//! work (pipelines, reply relays) resolves sessions here at the moment it
//! needs to send, so a connection that closed mid-flight is observed as absent.

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::messages::{MessageRoute, OutgoingMessage};

/// The connection behind a session is no longer accepting frames
#[derive(Debug, Error)]
#[error("Session {0} is closed")]
pub struct SessionClosed(pub String);

/// Cloneable send side of one client connection
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    tx: mpsc::Sender<MessageRoute>,
}

impl SessionHandle {
    pub fn new(id: impl Into<String>, tx: mpsc::Sender<MessageRoute>) -> Self {
        Self { id: id.into(), tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The connection's sender task is still draining frames
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a JSON control frame
    pub async fn send(&self, message: OutgoingMessage) -> Result<(), SessionClosed> {
        self.tx
            .send(MessageRoute::Outgoing(message))
            .await
            .map_err(|_| SessionClosed(self.id.clone()))
    }

    /// Queue a binary audio frame
    pub async fn send_audio(&self, audio: Bytes) -> Result<(), SessionClosed> {
        self.tx
            .send(MessageRoute::Audio(audio))
            .await
            .map_err(|_| SessionClosed(self.id.clone()))
    }
}

/// Concurrent map of live sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: SessionHandle) {
        debug!(session_id = %handle.id(), "Session registered");
        self.sessions.insert(handle.id.clone(), handle);
    }

    /// Resolve a session that is still open
    ///
    /// Entries whose connection has gone away are evicted and reported as absent.
    pub fn lookup(&self, session_id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.get(session_id).map(|entry| entry.value().clone())?;
        if handle.is_open() {
            return Some(handle);
        }

        // Read guard is released above; removing here cannot deadlock
        self.sessions
            .remove_if(session_id, |_, existing| !existing.is_open());
        debug!(session_id = %session_id, "Evicted closed session on lookup");
        None
    }

    /// Remove a session; returns whether an entry was present
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "Session removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
