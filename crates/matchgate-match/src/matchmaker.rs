//! The matchmaker: runs a [`MatchPolicy`] against a pool of waiting sessions.

use std::collections::HashSet;

use matchgate_protocol::cancel_payload;
use serde_json::Value;

use crate::{DefaultPolicy, Game, MatchPolicy, SessionPool, WaitingSession};

/// Groups waiting sessions into [`Game`]s.
///
/// The matchmaker holds no storage of its own and never mutates a pool:
/// the caller evicts matched sessions after delivering the games, and must
/// keep the pool from changing during a [`match_sessions`] call.
///
/// [`match_sessions`]: Self::match_sessions
#[derive(Debug, Clone, Default)]
pub struct Matchmaker<P = DefaultPolicy> {
    policy: P,
}

impl<P: MatchPolicy> Matchmaker<P> {
    /// Creates a matchmaker running `policy`.
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Sessions needed per game, never less than 1.
    pub fn group_size(&self) -> usize {
        self.policy.group_size().max(1)
    }

    /// Returns `true` if the pool holds enough sessions for one game.
    pub fn can_match<T>(&self, pool: &T) -> bool
    where
        T: SessionPool<Key = P::SessionId> + ?Sized,
    {
        pool.size() >= self.group_size()
    }

    /// Appends one game per full batch of waiting sessions to `games`.
    ///
    /// Sessions are consumed `group_size` at a time in the policy's
    /// consumption order until fewer than `group_size` remain; the leftovers
    /// stay unmatched. Each session appears in at most one produced game.
    /// `pool` is only read.
    pub fn match_sessions<T>(&self, games: &mut Vec<Game<P::SessionId>>, pool: &T, now: u64)
    where
        T: SessionPool<Key = P::SessionId> + ?Sized,
    {
        if !self.can_match(pool) {
            return;
        }
        let group_size = self.group_size();

        let mut candidates: Vec<&WaitingSession<P::SessionId>> = pool.sessions().collect();
        self.policy.order(&mut candidates, now);

        let mut seen = HashSet::with_capacity(candidates.len());
        candidates.retain(|s| seen.insert(s.id.clone()));

        let before = games.len();
        for batch in candidates.chunks_exact(group_size) {
            let sessions: Vec<P::SessionId> = batch.iter().map(|s| s.id.clone()).collect();
            let id = self.policy.game_id(now);
            let payload = self.policy.build_game(&sessions, id, now);
            tracing::debug!(game_id = %id, members = ?sessions, "game formed");
            games.push(Game::new(sessions, id, payload));
        }

        tracing::trace!(
            waiting = pool.size(),
            formed = games.len() - before,
            "match pass finished"
        );
    }

    /// Returns the cancellation payload, `{"matched": false}`.
    pub fn cancel_data(&self) -> Value {
        cancel_payload()
    }
}
