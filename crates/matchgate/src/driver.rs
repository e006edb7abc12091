//! Periodic match driver.
//!
//! Every `match_interval` the driver locks the lobby, runs the matchmaker
//! over the waiting pool, and sends each formed game to its members. It
//! then cancels sessions that have waited longer than `max_wait`. Matched
//! and cancelled sessions are evicted in the same critical section, so no
//! session is ever in two games or matched after being cancelled.

use std::sync::Arc;
use std::time::Duration;

use matchgate_match::MatchPolicy;
use matchgate_protocol::{Codec, SessionId};
use matchgate_session::Authenticator;
use rand::Rng;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::server::{Lobby, ServerState};

/// What one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PassSummary {
    pub(crate) games: usize,
    pub(crate) cancelled: usize,
}

/// Runs match passes forever.
///
/// The first pass is delayed by one interval plus a random jitter so that
/// several servers started together don't tick in lockstep. A pass that
/// overruns skips the missed ticks instead of bursting.
pub(crate) async fn run_driver<P, A>(state: Arc<ServerState<P, A>>)
where
    P: MatchPolicy<SessionId = SessionId>,
    A: Authenticator,
{
    let interval = state.config.match_interval;
    let first = Instant::now() + interval + jitter(state.config.initial_jitter);
    let mut ticker = time::interval_at(first, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::debug!(?interval, "match driver started");
    loop {
        ticker.tick().await;
        let summary = match_pass(&state).await;
        if summary != PassSummary::default() {
            tracing::debug!(
                games = summary.games,
                cancelled = summary.cancelled,
                "match pass"
            );
        }
    }
}

fn jitter(max: Duration) -> Duration {
    let max_us = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    if max_us == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rand::rng().random_range(0..max_us))
}

/// One pass: match, deliver, evict, then cancel the expired.
pub(crate) async fn match_pass<P, A>(state: &ServerState<P, A>) -> PassSummary
where
    P: MatchPolicy<SessionId = SessionId>,
    A: Authenticator,
{
    let now = state.now_ms();
    let mut lobby = state.lobby.lock().await;
    let mut summary = PassSummary::default();

    if state.matchmaker.can_match(&lobby.pool) {
        let mut games = Vec::new();
        state.matchmaker.match_sessions(&mut games, &lobby.pool, now);

        for game in &games {
            let frame = match state.codec.encode(&game.to_json()) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(game_id = %game.id, error = %e, "failed to encode game");
                    continue;
                }
            };
            tracing::info!(game_id = %game.id, members = ?game.session_list, "game matched");
            for &session_id in &game.session_list {
                lobby.evict(session_id, frame.clone());
            }
            summary.games += 1;
        }
    }

    summary.cancelled = cancel_expired(&mut lobby, state, now);
    summary
}

fn cancel_expired<P, A>(lobby: &mut Lobby, state: &ServerState<P, A>, now: u64) -> usize
where
    P: MatchPolicy<SessionId = SessionId>,
{
    let expired = lobby.pool.expired(now, state.config.max_wait_ms());
    if expired.is_empty() {
        return 0;
    }

    let frame = match state.codec.encode(&state.matchmaker.cancel_data()) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode cancel payload");
            return 0;
        }
    };
    for &session_id in &expired {
        tracing::info!(%session_id, "match wait expired, cancelling");
        lobby.evict(session_id, frame.clone());
    }
    expired.len()
}
