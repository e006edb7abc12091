//! Error types for the session layer.

use matchgate_protocol::SessionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Token verification failed: the token was invalid, expired, or
    /// rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No live session exists for the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The identity already has a live session. One connection per
    /// identity at a time.
    #[error("session {0} is already connected")]
    AlreadyConnected(SessionId),

    /// The session's connection task is gone, so nothing can be delivered.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}
