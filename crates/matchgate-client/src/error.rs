//! Error types for the client.

/// Boxed error returned by a failing user callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned synchronously by [`AuthenticatedConnection`] methods.
///
/// Only misuse is reported here. The connection's state is unchanged when
/// one of these is returned.
///
/// [`AuthenticatedConnection`]: crate::AuthenticatedConnection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The operation isn't allowed in the connection's current state.
    #[error("usage error: {0}")]
    Usage(&'static str),
}

/// A failure that escaped a user callback.
///
/// Produced by the isolation wrapper around every callback, logged, and
/// dropped. It never reaches the caller of `connect` and never changes the
/// connection's state.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The callback returned an error.
    #[error("{event} handler failed: {source}")]
    Failed {
        event: &'static str,
        #[source]
        source: BoxError,
    },

    /// The callback panicked.
    #[error("{event} handler panicked: {message}")]
    Panicked {
        event: &'static str,
        message: String,
    },
}
