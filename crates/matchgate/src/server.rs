//! `MatchServer` builder and server loop.
//!
//! This is the entry point for running a Matchgate server. It ties the
//! layers together: transport → token handshake → session registry →
//! waiting pool → matchmaker.

use std::sync::Arc;
use std::time::Instant;

use matchgate_match::{MatchPolicy, Matchmaker, WaitingPool};
use matchgate_protocol::{JsonCodec, SessionId};
use matchgate_session::{Authenticator, SessionRegistry};
use matchgate_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::driver::run_driver;
use crate::handler::handle_connection;
use crate::{MatchgateError, ServerConfig};

/// Everything a match pass needs to see at once.
///
/// Pool and registry share one lock so that a pass can deliver a payload
/// and evict the session without a connection slipping in between.
#[derive(Debug, Default)]
pub(crate) struct Lobby {
    pub(crate) pool: WaitingPool<SessionId>,
    pub(crate) registry: SessionRegistry,
}

impl Lobby {
    /// Removes a session from the pool and registry, handing it `frame`
    /// first. Dropping the registry entry closes the session's outbound
    /// channel, which tells its connection task to close.
    pub(crate) fn evict(&mut self, session_id: SessionId, frame: String) {
        self.pool.remove(&session_id);
        if let Err(e) = self.registry.deliver(session_id, frame) {
            tracing::warn!(%session_id, error = %e, "could not deliver to evicted session");
        }
        let _ = self.registry.remove(session_id);
    }
}

/// Shared server state passed to each connection task and the driver.
pub(crate) struct ServerState<P, A> {
    pub(crate) lobby: Mutex<Lobby>,
    pub(crate) matchmaker: Matchmaker<P>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
    started: Instant,
}

impl<P, A> ServerState<P, A>
where
    P: MatchPolicy<SessionId = SessionId>,
{
    pub(crate) fn new(policy: P, auth: A, config: ServerConfig) -> Self {
        Self {
            lobby: Mutex::new(Lobby::default()),
            matchmaker: Matchmaker::new(policy),
            auth,
            codec: JsonCodec,
            config: config.validated(),
            started: Instant::now(),
        }
    }
}

impl<P, A> ServerState<P, A> {
    /// Milliseconds since the server started; the clock used for
    /// `enqueued_at`, `max_wait` and match time.
    pub(crate) fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Matchgate server.
///
/// # Example
///
/// ```rust,ignore
/// use matchgate::prelude::*;
///
/// let server = MatchServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(DefaultPolicy::new(), my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct MatchServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl MatchServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// # Errors
    /// [`MatchgateError::Transport`] if the address can't be bound.
    pub async fn build<P, A>(self, policy: P, auth: A) -> Result<MatchServer<P, A>, MatchgateError>
    where
        P: MatchPolicy<SessionId = SessionId>,
        A: Authenticator,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState::new(policy, auth, self.config));

        Ok(MatchServer { transport, state })
    }
}

impl Default for MatchServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Matchgate server: accepts token-authenticated sessions, pools them,
/// and sends each one its game or the cancel payload.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MatchServer<P, A> {
    transport: WebSocketTransport,
    state: Arc<ServerState<P, A>>,
}

impl MatchServer<(), ()> {
    /// Creates a new builder.
    pub fn builder() -> MatchServerBuilder {
        MatchServerBuilder::new()
    }
}

impl<P, A> MatchServer<P, A>
where
    P: MatchPolicy<SessionId = SessionId>,
    A: Authenticator,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the match driver and the accept loop.
    ///
    /// Spawns a task per accepted connection. Runs until the process is
    /// terminated or the future is dropped.
    pub async fn run(mut self) -> Result<(), MatchgateError> {
        tracing::info!(
            group_size = self.state.matchmaker.group_size(),
            interval = ?self.state.config.match_interval,
            max_wait = ?self.state.config.max_wait,
            "Matchgate server running"
        );

        let driver = tokio::spawn(run_driver(Arc::clone(&self.state)));
        let _driver = AbortOnDrop(driver);

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Stops the driver when the server future goes away.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
