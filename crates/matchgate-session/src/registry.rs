//! The session registry: every live, authenticated session and its
//! outbound channel.
//!
//! A connection task registers its session after the token checks out and
//! removes it when the connection ends. Anything that wants to reach a
//! session (the match driver delivering a game, for instance) goes through
//! [`SessionRegistry::deliver`] instead of touching the connection.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain `HashMap` with no locking of its own. The
//! server keeps it behind the same mutex as the waiting pool so that
//! delivering a payload and evicting the session happen together.

use std::collections::HashMap;

use matchgate_protocol::SessionId;
use tokio::sync::mpsc;

use crate::SessionError;

/// Channel that carries text frames to one session's connection task.
pub type Outbound = mpsc::UnboundedSender<String>;

/// A live session as seen by the registry.
#[derive(Debug, Clone)]
pub struct LiveSession {
    /// Which session this is.
    pub session_id: SessionId,
    /// When the session was registered, in the server's milliseconds.
    pub connected_at: u64,
    outbound: Outbound,
}

impl LiveSession {
    /// Returns `true` while the connection task is still receiving.
    pub fn is_reachable(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Tracks live sessions by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, LiveSession>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Registers a freshly authenticated session.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the identity already has a
    /// reachable session. A stale entry whose connection task is gone is
    /// replaced.
    pub fn register(
        &mut self,
        session_id: SessionId,
        outbound: Outbound,
        now: u64,
    ) -> Result<&LiveSession, SessionError> {
        if let Some(existing) = self.sessions.get(&session_id) {
            if existing.is_reachable() {
                return Err(SessionError::AlreadyConnected(session_id));
            }
            tracing::debug!(%session_id, "replacing stale session");
        }

        self.sessions.insert(
            session_id,
            LiveSession {
                session_id,
                connected_at: now,
                outbound,
            },
        );
        tracing::info!(%session_id, "session registered");
        self.sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))
    }

    /// Removes a session.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if it isn't registered.
    pub fn remove(&mut self, session_id: SessionId) -> Result<LiveSession, SessionError> {
        let session = self
            .sessions
            .remove(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        tracing::info!(%session_id, "session removed");
        Ok(session)
    }

    /// Queues a text frame for a session's connection.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: no such session
    /// - [`SessionError::Unavailable`]: its connection task has exited
    pub fn deliver(&self, session_id: SessionId, frame: String) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        session
            .outbound
            .send(frame)
            .map_err(|_| SessionError::Unavailable(session_id))
    }

    /// Returns the registered session, reachable or not.
    pub fn get(&self, session_id: &SessionId) -> Option<&LiveSession> {
        self.sessions.get(session_id)
    }

    /// Returns `true` if the session is registered.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Returns the number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(id: u64) -> SessionId {
        SessionId(id)
    }

    #[test]
    fn test_register_new_session() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let session = registry.register(sid(1), tx, 42).expect("should register");
        assert_eq!(session.session_id, sid(1));
        assert_eq!(session.connected_at, 42);
        assert!(session.is_reachable());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_twice_while_reachable_fails() {
        let mut registry = SessionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        registry.register(sid(1), tx1, 0).unwrap();
        let result = registry.register(sid(1), tx2, 0);
        assert!(matches!(result, Err(SessionError::AlreadyConnected(id)) if id == sid(1)));
    }

    #[test]
    fn test_register_replaces_stale_session() {
        let mut registry = SessionRegistry::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        registry.register(sid(1), tx1, 0).unwrap();
        drop(rx1);

        let (tx2, _rx2) = mpsc::unbounded_channel();
        let session = registry.register(sid(1), tx2, 5).expect("stale entry is replaced");
        assert_eq!(session.connected_at, 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_deliver_reaches_receiver() {
        let mut registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(sid(7), tx, 0).unwrap();

        registry.deliver(sid(7), "hello".into()).expect("deliver");
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_deliver_unknown_session_is_not_found() {
        let registry = SessionRegistry::new();
        let result = registry.deliver(sid(3), "x".into());
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_deliver_to_closed_connection_is_unavailable() {
        let mut registry = SessionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(sid(2), tx, 0).unwrap();
        drop(rx);

        let result = registry.deliver(sid(2), "x".into());
        assert!(matches!(result, Err(SessionError::Unavailable(_))));
        assert!(!registry.get(&sid(2)).unwrap().is_reachable());
    }

    #[test]
    fn test_remove() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(sid(1), tx, 0).unwrap();

        let removed = registry.remove(sid(1)).expect("present");
        assert_eq!(removed.session_id, sid(1));
        assert!(registry.is_empty());
        assert!(!registry.contains(&sid(1)));
        assert!(matches!(registry.remove(sid(1)), Err(SessionError::NotFound(_))));
    }
}
