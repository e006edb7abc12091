//! Per-connection handler: token handshake, pooling, and frame routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive the token frame → authenticate → `SessionId`
//!   2. Register the session and put it in the waiting pool
//!   3. Loop: inbound JSON replaces the session's matching data, outbound
//!      frames queued by the driver go to the peer
//!   4. When the driver evicts the session (game or cancel), close

use std::sync::Arc;

use matchgate_match::{MatchPolicy, WaitingSession};
use matchgate_protocol::{Codec, ProtocolError, SessionId, Token};
use matchgate_session::Authenticator;
use matchgate_transport::{Connection, WebSocketConnection};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::MatchgateError;

/// Drop guard that takes a session out of the lobby when its handler exits.
///
/// The guard owns the session's outbound receiver and closes it before
/// cleanup is queued, so the cleanup task always sees this entry as
/// unreachable. Cleanup runs even if the handler panics. `Drop` is
/// synchronous, so the async lock is taken in a fire-and-forget task. An
/// entry that another connection has since taken over is left alone.
struct SessionGuard<P, A>
where
    P: MatchPolicy<SessionId = SessionId>,
    A: Authenticator,
{
    session_id: SessionId,
    state: Arc<ServerState<P, A>>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl<P, A> Drop for SessionGuard<P, A>
where
    P: MatchPolicy<SessionId = SessionId>,
    A: Authenticator,
{
    fn drop(&mut self) {
        self.outbound.close();
        let session_id = self.session_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut lobby = state.lobby.lock().await;
            let stale = lobby
                .registry
                .get(&session_id)
                .is_some_and(|live| !live.is_reachable());
            if stale {
                lobby.pool.remove(&session_id);
                let _ = lobby.registry.remove(session_id);
                tracing::debug!(%session_id, "session left before being matched");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P, A>(
    conn: WebSocketConnection,
    state: Arc<ServerState<P, A>>,
) -> Result<(), MatchgateError>
where
    P: MatchPolicy<SessionId = SessionId>,
    A: Authenticator,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Token ---
    let session_id = match authenticate(&conn, &state).await {
        Ok(id) => id,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, %session_id, "session authenticated");

    // --- Step 2: Register and pool ---
    let (tx, outbound) = mpsc::unbounded_channel();
    {
        let now = state.now_ms();
        let mut lobby = state.lobby.lock().await;
        let registered = lobby.registry.register(session_id, tx, now).map(|_| ());
        if let Err(e) = registered {
            drop(lobby);
            let _ = conn.close().await;
            return Err(e.into());
        }
        lobby.pool.insert(WaitingSession::new(session_id, now));
        tracing::debug!(%session_id, waiting = lobby.pool.len(), "session pooled");
    }
    let mut guard = SessionGuard {
        session_id,
        state: Arc::clone(&state),
        outbound,
    };

    // --- Step 3: Route frames until evicted or gone ---
    loop {
        tokio::select! {
            frame = guard.outbound.recv() => match frame {
                Some(frame) => {
                    tracing::trace!(%session_id, len = frame.len(), "sending frame");
                    if let Err(e) = conn.send(&frame).await {
                        tracing::debug!(%session_id, error = %e, "send failed");
                        break;
                    }
                }
                None => {
                    tracing::debug!(%session_id, "session evicted, closing");
                    if let Err(e) = conn.close().await {
                        tracing::debug!(%session_id, error = %e, "close failed");
                    }
                    break;
                }
            },
            inbound = conn.recv() => match inbound {
                Ok(Some(text)) => update_data(&state, session_id, &text).await,
                Ok(None) => {
                    tracing::info!(%session_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%session_id, error = %e, "recv error");
                    break;
                }
            },
        }
    }

    // guard drops here → lobby cleanup fires.
    Ok(())
}

/// Waits for the token frame and checks it.
async fn authenticate<P, A>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<P, A>>,
) -> Result<SessionId, MatchgateError>
where
    P: MatchPolicy<SessionId = SessionId>,
    A: Authenticator,
{
    let frame = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(frame))) => frame,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before token".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(MatchgateError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("token timed out".into()).into());
        }
    };

    let token = Token::new(frame);
    match state.auth.authenticate(&token).await {
        Ok(session_id) => Ok(session_id),
        Err(e) => {
            tracing::info!(conn_id = %conn.id(), error = %e, "rejected token");
            Err(MatchgateError::Session(e))
        }
    }
}

/// Replaces a waiting session's matching data with a JSON frame.
async fn update_data<P, A>(state: &ServerState<P, A>, session_id: SessionId, text: &str) {
    let data: Value = match state.codec.decode(text) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(%session_id, error = %e, "ignoring non-JSON frame");
            return;
        }
    };
    let mut lobby = state.lobby.lock().await;
    if !lobby.pool.update_data(&session_id, data) {
        tracing::trace!(%session_id, "data update for a session no longer waiting");
    }
}
