//! # Matchgate
//!
//! Token-authenticated matchmaking for real-time games.
//!
//! A client opens a session with [`AuthenticatedConnection`], which sends
//! its bearer token as the first frame. The [`MatchServer`] checks the
//! token with your [`Authenticator`], parks the session in a waiting pool,
//! and periodically runs a [`Matchmaker`] over the pool. Every session
//! ends up with either a game payload (`{"matched": true, ...}`) or, after
//! waiting too long, the cancel payload `{"matched": false}`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matchgate::prelude::*;
//!
//! struct NumericTokens;
//!
//! impl Authenticator for NumericTokens {
//!     async fn authenticate(&self, token: &Token) -> Result<SessionId, SessionError> {
//!         token
//!             .as_str()
//!             .parse()
//!             .map(SessionId)
//!             .map_err(|_| SessionError::AuthFailed("not a number".into()))
//!     }
//! }
//!
//! # async fn run() -> Result<(), MatchgateError> {
//! let server = MatchServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(DefaultPolicy::new(), NumericTokens)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod driver;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::MatchgateError;
pub use server::{MatchServer, MatchServerBuilder};

pub use matchgate_client::{
    AuthenticatedConnection, CallbackResult, ClientError, ConnectionConfig, ConnectionState,
    SessionEnd, Status,
};
pub use matchgate_match::{
    ConsumptionOrder, DefaultPolicy, Game, MatchPolicy, Matchmaker, SessionPool, WaitingPool,
    WaitingSession,
};
pub use matchgate_protocol::{GameId, MatchOutcome, SessionId, Token};
pub use matchgate_session::{Authenticator, SessionError};

/// Everything needed to run a server or a client.
pub mod prelude {
    pub use crate::{
        AuthenticatedConnection, Authenticator, ClientError, ConnectionConfig, ConnectionState,
        DefaultPolicy, Game, GameId, MatchOutcome, MatchPolicy, MatchServer, MatchgateError,
        Matchmaker, ServerConfig, SessionEnd, SessionError, SessionId, Token, WaitingSession,
    };
}
