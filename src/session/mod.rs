//! Session registry for the two device roles
//!
//! Tracks connected Speaker and Listener sessions. Speakers are unbounded;
//! the Listener slot is exclusive — registering a new listener atomically
//! replaces the previous one, revoking its status as delivery target without
//! touching its transport. All operations are safe under concurrent
//! connection tasks.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Connection role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Submits audio segments for recognition
    Speaker,
    /// Receives matched answers; at most one active at a time
    Listener,
}

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound handle to a listener connection's writer task
pub type ListenerHandle = mpsc::Sender<String>;

/// A registered session
#[derive(Debug, Clone)]
struct SpeakerSession {
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ListenerSession {
    id: SessionId,
    handle: ListenerHandle,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    speakers: HashMap<SessionId, SpeakerSession>,
    listener: Option<ListenerSession>,
}

/// Registry of connected device sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a speaker connection
    pub fn register_speaker(&self) -> SessionId {
        let id = SessionId(Uuid::new_v4());
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.speakers.insert(
            id,
            SpeakerSession {
                connected_at: Utc::now(),
            },
        );
        tracing::info!(session_id = %id, speakers = inner.speakers.len(), "speaker connected");
        id
    }

    /// Register a listener connection, replacing any existing listener
    ///
    /// The replaced listener's transport is not closed here; it simply stops
    /// receiving answers.
    pub fn register_listener(&self, handle: ListenerHandle) -> SessionId {
        let id = SessionId(Uuid::new_v4());
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let replaced = inner.listener.replace(ListenerSession {
            id,
            handle,
            connected_at: Utc::now(),
        });
        match replaced {
            Some(prior) => {
                tracing::info!(session_id = %id, replaced = %prior.id, "listener replaced");
            }
            None => tracing::info!(session_id = %id, "listener connected"),
        }
        id
    }

    /// Remove a session by id
    ///
    /// Removing a listener id that has already been replaced is a no-op, so
    /// a stale disconnect never evicts its successor.
    pub fn unregister(&self, id: SessionId) {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.speakers.remove(&id).is_some() {
            tracing::info!(session_id = %id, "speaker disconnected");
            return;
        }
        if inner.listener.as_ref().is_some_and(|l| l.id == id) {
            inner.listener = None;
            tracing::info!(session_id = %id, "listener disconnected");
        }
    }

    /// Handle of the currently registered listener, if any
    #[must_use]
    pub fn current_listener(&self) -> Option<ListenerHandle> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .listener
            .as_ref()
            .map(|l| l.handle.clone())
    }

    /// Whether a listener is currently connected
    #[must_use]
    pub fn listener_connected(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .listener
            .is_some()
    }

    /// Number of connected speakers
    #[must_use]
    pub fn speaker_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .speakers
            .len()
    }

    /// Connection time of the current listener (status surface)
    #[must_use]
    pub fn listener_since(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .listener
            .as_ref()
            .map(|l| l.connected_at)
    }
}
