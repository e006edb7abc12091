//! Authenticated session client for Matchgate.
//!
//! [`AuthenticatedConnection`] owns one transport session at a time. It
//! sends the bearer token as the very first frame, dispatches open, close
//! and message events to user callbacks, and keeps every callback failure
//! away from the session.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──connect()──→ Connecting ──established──→ Active ──close──→ Closed
//!  ↑                      │                          │
//!  │                 dial failed                runtime error
//!  └──────────────────────┘                          ↓
//!                                                 Failed
//! reset(): any state ──→ Idle (new generation)
//! ```
//!
//! Misuse (sending while not Active, changing handlers while not Idle, ...)
//! fails right away with [`ClientError::Usage`]. Transport faults never
//! surface as errors from the call that triggered them; they show up only
//! through [`AuthenticatedConnection::has_failed`], the state, and the close
//! callback.

mod callback;
mod config;
mod connection;
mod error;
mod state;

pub use callback::CallbackResult;
pub use config::ConnectionConfig;
pub use connection::AuthenticatedConnection;
pub use error::{CallbackError, ClientError};
pub use matchgate_protocol::Token;
pub use state::{ConnectionState, SessionEnd, Status};
