//! Connection lifecycle states.

use std::fmt;

/// Where a connection is in its lifecycle.
///
/// `Closed` and `Failed` are terminal until
/// [`reset`](crate::AuthenticatedConnection::reset) starts a new
/// generation in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected; handlers may be changed and `connect` may be called.
    #[default]
    Idle,
    /// `connect` was accepted and the transport is being established.
    Connecting,
    /// The session is open and its event loop is running.
    Active,
    /// The session ended gracefully.
    Closed,
    /// The session was ended by a transport error.
    Failed,
}

impl ConnectionState {
    /// Returns `true` for `Closed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Snapshot published on every lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub state: ConnectionState,
    /// Set when the last attempt failed, either while establishing the
    /// transport or at runtime. Cleared when a session becomes Active and
    /// on reset.
    pub failed: bool,
}

/// How a `connect` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The transport could not be established; the connection is back in
    /// `Idle` with the failure flag set.
    NotEstablished,
    /// The session closed gracefully.
    Closed,
    /// A transport error ended the session.
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_idle_and_not_failed() {
        let status = Status::default();
        assert_eq!(status.state, ConnectionState::Idle);
        assert!(!status.failed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::Idle.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Active.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Active.to_string(), "Active");
        assert_eq!(ConnectionState::Failed.to_string(), "Failed");
    }
}
