//! The authenticated connection and its session loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use matchgate_protocol::Token;
use matchgate_transport::{Connection, Dialer, WebSocketDialer};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

use crate::callback::{CallbackResult, Handlers};
use crate::{ClientError, ConnectionConfig, ConnectionState, SessionEnd, Status};

/// Requests from the public API to the running session loop.
#[derive(Debug)]
enum Command {
    Send(String),
    Close,
}

/// Mutable lifecycle data, guarded by one lock.
///
/// `generation` is bumped by every reset. A session loop only writes its
/// outcome back if the generation it started under is still current, so a
/// loop orphaned by `reset` can never move the new generation out of Idle.
#[derive(Debug, Default)]
struct Lifecycle {
    state: ConnectionState,
    failed: bool,
    generation: u64,
    token: Option<Token>,
    commands: Option<mpsc::UnboundedSender<Command>>,
}

struct Inner<D> {
    dialer: D,
    config: ConnectionConfig,
    lifecycle: Mutex<Lifecycle>,
    handlers: Mutex<Handlers>,
    status: watch::Sender<Status>,
    /// Mirrors `Lifecycle::generation` so a pending dial can notice a reset.
    resets: watch::Sender<u64>,
}

impl<D> Inner<D> {
    /// Applies `f` to the lifecycle and publishes the resulting status.
    ///
    /// The status is published while the lifecycle lock is still held, so
    /// watchers never see updates out of order.
    fn update<R>(&self, f: impl FnOnce(&mut Lifecycle) -> R) -> R {
        let mut lifecycle = lock(&self.lifecycle);
        let result = f(&mut *lifecycle);
        let next = Status {
            state: lifecycle.state,
            failed: lifecycle.failed,
        };
        self.status.send_if_modified(|status| {
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Callbacks never run under these locks, so a poisoned lock still holds
    // consistent data.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A client session that authenticates with a bearer token.
///
/// The token is sent as the first text frame once the transport is up,
/// before the open callback runs. After that the connection dispatches
/// inbound frames to the message callback until the peer closes, a transport
/// error occurs, or [`disconnect`](Self::disconnect) is called.
///
/// The handle is cheap to clone. All clones drive the same connection, so
/// one task can sit in [`connect`](Self::connect) while others call
/// [`send`](Self::send), [`disconnect`](Self::disconnect) or read the state.
///
/// # Example
///
/// ```no_run
/// use matchgate_client::{AuthenticatedConnection, SessionEnd};
///
/// # async fn run() -> Result<(), matchgate_client::ClientError> {
/// let client = AuthenticatedConnection::new();
/// client.set_message_handler(|frame| {
///     println!("got {frame}");
///     Ok(())
/// })?;
///
/// match client.connect("ws://127.0.0.1:8080", "42").await? {
///     SessionEnd::NotEstablished => eprintln!("could not connect"),
///     SessionEnd::Closed => println!("bye"),
///     SessionEnd::Failed => eprintln!("connection lost"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct AuthenticatedConnection<D: Dialer = WebSocketDialer> {
    inner: Arc<Inner<D>>,
}

impl<D: Dialer> Clone for AuthenticatedConnection<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AuthenticatedConnection<WebSocketDialer> {
    /// Creates an idle WebSocket client with default settings.
    pub fn new() -> Self {
        Self::websocket(ConnectionConfig::default())
    }

    /// Creates an idle WebSocket client.
    pub fn websocket(config: ConnectionConfig) -> Self {
        Self::with_dialer(WebSocketDialer, config)
    }
}

impl Default for AuthenticatedConnection<WebSocketDialer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dialer> AuthenticatedConnection<D> {
    /// Creates an idle client that opens sessions through `dialer`.
    pub fn with_dialer(dialer: D, config: ConnectionConfig) -> Self {
        let (status, _) = watch::channel(Status::default());
        let (resets, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                dialer,
                config,
                lifecycle: Mutex::new(Lifecycle::default()),
                handlers: Mutex::new(Handlers::default()),
                status,
                resets,
            }),
        }
    }

    // =====================================================================
    // Lifecycle
    // =====================================================================

    /// Connects to `endpoint`, authenticates with `token`, and runs the
    /// session until it ends.
    ///
    /// Transport problems never come back as errors. An endpoint that can't
    /// be reached within [`ConnectionConfig::connect_timeout`] yields
    /// [`SessionEnd::NotEstablished`] and leaves the connection in Idle with
    /// [`has_failed`](Self::has_failed) set; a runtime error yields
    /// [`SessionEnd::Failed`]. A [`reset`](Self::reset) while connecting
    /// abandons the attempt and also yields `NotEstablished`.
    ///
    /// # Errors
    /// [`ClientError::Usage`] if the connection isn't Idle.
    pub async fn connect(
        &self,
        endpoint: &str,
        token: impl Into<Token>,
    ) -> Result<SessionEnd, ClientError> {
        let token = token.into();
        let (generation, resets) = self.inner.update(|lc| {
            if lc.state != ConnectionState::Idle {
                return Err(ClientError::Usage("already active"));
            }
            lc.state = ConnectionState::Connecting;
            lc.token = Some(token.clone());
            Ok((lc.generation, self.inner.resets.subscribe()))
        })?;
        let handlers = lock(&self.inner.handlers).clone();

        tracing::debug!(endpoint, "connecting");
        let connect_timeout = self.inner.config.connect_timeout;
        let dialed = tokio::select! {
            dialed = time::timeout(connect_timeout, self.inner.dialer.dial(endpoint)) => dialed,
            () = reset_signal(resets, generation) => {
                tracing::debug!(endpoint, "reset while connecting, abandoning dial");
                return Ok(SessionEnd::NotEstablished);
            }
        };
        let conn = match dialed {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::debug!(endpoint, error = %e, "failed to establish connection");
                self.mark_not_established(generation);
                return Ok(SessionEnd::NotEstablished);
            }
            Err(_) => {
                tracing::warn!(endpoint, timeout = ?connect_timeout, "connect timed out");
                self.mark_not_established(generation);
                return Ok(SessionEnd::NotEstablished);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let attached = self.inner.update(|lc| {
            if lc.generation != generation {
                return false;
            }
            lc.state = ConnectionState::Active;
            lc.failed = false;
            lc.commands = Some(tx);
            true
        });
        if !attached {
            tracing::debug!(conn = %conn.id(), "reset while connecting, dropping session");
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "error closing abandoned session");
            }
            return Ok(SessionEnd::NotEstablished);
        }
        tracing::info!(conn = %conn.id(), endpoint, "session open");

        let outcome = run_session(&conn, &token, &handlers, rx, &self.inner.config).await;

        let end = match &outcome {
            Ok(()) => SessionEnd::Closed,
            Err(e) => {
                tracing::error!(conn = %conn.id(), error = %e, "session failed");
                SessionEnd::Failed
            }
        };
        self.inner.update(|lc| {
            if lc.generation != generation {
                return;
            }
            lc.commands = None;
            match end {
                SessionEnd::Failed => {
                    lc.state = ConnectionState::Failed;
                    lc.failed = true;
                }
                _ => lc.state = ConnectionState::Closed,
            }
        });
        tracing::info!(conn = %conn.id(), ?end, "session ended");
        handlers.on_close();

        Ok(end)
    }

    fn mark_not_established(&self, generation: u64) {
        self.inner.update(|lc| {
            if lc.generation == generation {
                lc.state = ConnectionState::Idle;
                lc.failed = true;
            }
        });
    }

    /// Asks the running session to close gracefully.
    ///
    /// Returns once the request is queued; the close callback runs when the
    /// session loop finishes closing.
    ///
    /// # Errors
    /// [`ClientError::Usage`] if the connection isn't Active.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        let commands = self.active_commands()?;
        if commands.send(Command::Close).is_err() {
            tracing::error!("close request dropped, session loop already gone");
        }
        Ok(())
    }

    /// Queues a text frame for the peer.
    ///
    /// Transport failures while sending are logged and dropped.
    ///
    /// # Errors
    /// [`ClientError::Usage`] if the connection isn't Active.
    pub fn send(&self, payload: impl Into<String>) -> Result<(), ClientError> {
        let commands = self.active_commands()?;
        if commands.send(Command::Send(payload.into())).is_err() {
            tracing::error!("send dropped, session loop already gone");
        }
        Ok(())
    }

    /// Returns the connection to a fresh Idle state.
    ///
    /// An Active session is asked to close first and a pending connect is
    /// abandoned. Clears the failure flag and the stored token; handlers are
    /// kept. Calling it twice is the same
    /// as calling it once.
    pub fn reset(&self) {
        let commands = self.inner.update(|lc| {
            let commands = lc.commands.take();
            lc.generation = lc.generation.wrapping_add(1);
            self.inner.resets.send_replace(lc.generation);
            lc.state = ConnectionState::Idle;
            lc.failed = false;
            lc.token = None;
            commands
        });
        if let Some(commands) = commands {
            tracing::debug!("reset while active, closing session");
            if commands.send(Command::Close).is_err() {
                tracing::error!("close request dropped, session loop already gone");
            }
        }
    }

    fn active_commands(&self) -> Result<mpsc::UnboundedSender<Command>, ClientError> {
        self.inner.update(|lc| match (&lc.state, &lc.commands) {
            (ConnectionState::Active, Some(commands)) => Ok(commands.clone()),
            _ => Err(ClientError::Usage("not active")),
        })
    }

    // =====================================================================
    // Observation
    // =====================================================================

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.status.borrow().state
    }

    /// Returns `true` while the session is Active.
    pub fn is_running(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Returns `true` if the last attempt failed.
    pub fn has_failed(&self) -> bool {
        self.inner.status.borrow().failed
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.inner.status.subscribe()
    }

    /// The token passed to the last accepted `connect`, until reset.
    pub fn token(&self) -> Option<Token> {
        lock(&self.inner.lifecycle).token.clone()
    }

    /// Returns the settings this connection was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    // =====================================================================
    // Handlers
    // =====================================================================

    /// Sets the callback run right after the token frame is sent.
    ///
    /// # Errors
    /// [`ClientError::Usage`] unless the connection is Idle.
    pub fn set_open_handler<F>(&self, f: F) -> Result<(), ClientError>
    where
        F: Fn() -> CallbackResult + Send + Sync + 'static,
    {
        self.replace_handler(|h| h.open = Arc::new(f))
    }

    /// Sets the callback run after the session has ended, whether it closed
    /// or failed.
    ///
    /// # Errors
    /// [`ClientError::Usage`] unless the connection is Idle.
    pub fn set_close_handler<F>(&self, f: F) -> Result<(), ClientError>
    where
        F: Fn() -> CallbackResult + Send + Sync + 'static,
    {
        self.replace_handler(|h| h.close = Arc::new(f))
    }

    /// Sets the callback run with every inbound text frame.
    ///
    /// # Errors
    /// [`ClientError::Usage`] unless the connection is Idle.
    pub fn set_message_handler<F>(&self, f: F) -> Result<(), ClientError>
    where
        F: Fn(&str) -> CallbackResult + Send + Sync + 'static,
    {
        self.replace_handler(|h| h.message = Arc::new(f))
    }

    fn replace_handler(&self, f: impl FnOnce(&mut Handlers)) -> Result<(), ClientError> {
        self.inner.update(|lc| {
            if lc.state != ConnectionState::Idle {
                return Err(ClientError::Usage("already active"));
            }
            f(&mut *lock(&self.inner.handlers));
            Ok(())
        })
    }
}

impl<D: Dialer> std::fmt::Debug for AuthenticatedConnection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = *self.inner.status.borrow();
        f.debug_struct("AuthenticatedConnection")
            .field("state", &status.state)
            .field("failed", &status.failed)
            .finish()
    }
}

/// Resolves once the lifecycle has moved past `generation`.
async fn reset_signal(mut resets: watch::Receiver<u64>, generation: u64) {
    while *resets.borrow_and_update() == generation {
        if resets.changed().await.is_err() {
            // The sender lives as long as the connection itself.
            std::future::pending::<()>().await;
        }
    }
}

// =========================================================================
// Session loop
// =========================================================================

/// Drives one established session to its end.
///
/// Returns `Ok(())` on a graceful close and the transport error otherwise.
/// Errors while sending are logged and the loop carries on.
async fn run_session<C: Connection>(
    conn: &C,
    token: &Token,
    handlers: &Handlers,
    mut commands: mpsc::UnboundedReceiver<Command>,
    config: &ConnectionConfig,
) -> Result<(), C::Error> {
    if let Err(e) = conn.send(token.as_str()).await {
        tracing::error!(conn = %conn.id(), error = %e, "failed to send token frame");
    }
    handlers.on_open();

    let mut close_deadline: Option<Instant> = None;
    let mut commands_open = true;

    loop {
        tokio::select! {
            command = commands.recv(), if commands_open => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = conn.send(&text).await {
                        tracing::error!(conn = %conn.id(), error = %e, "failed to send frame");
                    }
                }
                Some(Command::Close) => {
                    request_close(conn, &mut close_deadline, config).await;
                }
                None => {
                    commands_open = false;
                    request_close(conn, &mut close_deadline, config).await;
                }
            },
            incoming = conn.recv() => match incoming {
                Ok(Some(frame)) => handlers.on_message(&frame),
                Ok(None) => return Ok(()),
                Err(e) if close_deadline.is_some() => {
                    tracing::debug!(conn = %conn.id(), error = %e, "error while closing");
                    return Ok(());
                }
                Err(e) => return Err(e),
            },
            _ = time::sleep_until(close_deadline.unwrap_or_else(Instant::now)),
                if close_deadline.is_some() =>
            {
                tracing::warn!(conn = %conn.id(), "peer did not acknowledge close in time");
                return Ok(());
            }
        }
    }
}

async fn request_close<C: Connection>(
    conn: &C,
    close_deadline: &mut Option<Instant>,
    config: &ConnectionConfig,
) {
    if close_deadline.is_some() {
        return;
    }
    tracing::debug!(conn = %conn.id(), "closing session");
    if let Err(e) = conn.close().await {
        tracing::error!(conn = %conn.id(), error = %e, "error closing session");
    }
    *close_deadline = Some(Instant::now() + config.close_timeout);
}
