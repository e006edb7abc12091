//! Transport abstraction layer for Matchgate.
//!
//! Provides the [`Connection`] trait for a single text-framed session, the
//! [`Transport`] trait for the accepting side, and the [`Dialer`] trait for
//! the connecting side.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketDialer, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// Establishes outgoing connections to an endpoint.
///
/// Establishment covers everything up to an open session: address
/// resolution, the TCP connect, and the protocol handshake. A returned
/// connection is ready for [`Connection::send`].
pub trait Dialer: Send + Sync + 'static {
    /// The connection type produced by this dialer.
    type Connection: Connection<Error = Self::Error>;
    /// The error type for dial and connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a session to `endpoint`.
    fn dial(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single session that exchanges text frames.
///
/// Frames are opaque to this layer; no framing beyond what the underlying
/// protocol provides is added.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one text frame to the remote peer.
    fn send(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next text frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// Starts a graceful close.
    ///
    /// [`recv`](Self::recv) keeps yielding until the peer acknowledges, then
    /// returns `Ok(None)`.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
