//! Token verification hook.
//!
//! Matchgate doesn't issue or cryptographically check credentials. It
//! defines the [`Authenticator`] trait: one async method that takes the
//! bearer token a client sent as its first frame and returns the
//! [`SessionId`] it proves, or an error. Plug in JWT validation, a call to
//! an auth service, or a fixed table in tests.

use std::future::Future;

use matchgate_protocol::{SessionId, Token};

use crate::SessionError;

/// Verifies a bearer token and yields the session identity it carries.
///
/// # Example
///
/// ```rust
/// use matchgate_protocol::{SessionId, Token};
/// use matchgate_session::{Authenticator, SessionError};
///
/// /// Development only: the token is the numeric session id.
/// struct NumericTokens;
///
/// impl Authenticator for NumericTokens {
///     async fn authenticate(&self, token: &Token) -> Result<SessionId, SessionError> {
///         token
///             .as_str()
///             .parse()
///             .map(SessionId)
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and returns the identity it proves.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] if the token is invalid or expired.
    fn authenticate(
        &self,
        token: &Token,
    ) -> impl Future<Output = Result<SessionId, SessionError>> + Send;
}
