//! Unified error type for Matchgate.

use matchgate_client::ClientError;
use matchgate_protocol::ProtocolError;
use matchgate_session::SessionError;
use matchgate_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `matchgate` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
#[derive(Debug, thiserror::Error)]
pub enum MatchgateError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, duplicate identity, delivery).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Client misuse.
    #[error(transparent)]
    Client(#[from] ClientError),
}
