//! Session handling for Matchgate.
//!
//! 1. **Token verification**: proving who a session is
//!    ([`Authenticator`] trait; the verification itself is external)
//! 2. **Session tracking**: knowing which authenticated sessions are live
//!    and how to reach them ([`SessionRegistry`])
//!
//! ```text
//! Server (above)   ← verifies tokens, registers sessions, delivers payloads
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides SessionId, Token
//! ```

mod auth;
mod error;
mod registry;

pub use auth::Authenticator;
pub use error::SessionError;
pub use registry::{LiveSession, Outbound, SessionRegistry};
