//! The `MatchPolicy` trait: the rule set a [`Matchmaker`](crate::Matchmaker)
//! runs.
//!
//! A policy decides how many sessions form a game, in which order waiting
//! sessions are consumed, how game ids are minted, and what the game
//! payload looks like. Everything has a default except the identity type.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use matchgate_protocol::{GameId, SessionId, MATCHED_FIELD};
use serde_json::{Map, Value};

use crate::{SessionKey, WaitingSession};

/// Last game id handed out by [`mint_game_id`].
static LAST_GAME_ID: AtomicU64 = AtomicU64::new(0);

/// Mints a fresh game id seeded from `now`.
///
/// Ids are strictly increasing within the process: the result is `now`
/// unless that was already used, in which case it is one past the last id.
pub fn mint_game_id(now: u64) -> GameId {
    let prev = LAST_GAME_ID
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
            Some(now.max(last.wrapping_add(1)))
        })
        .unwrap_or_else(|last| last);
    GameId(now.max(prev.wrapping_add(1)))
}

/// The pluggable rule set for grouping waiting sessions.
///
/// Implementations must be pure with respect to the pool: the matchmaker
/// hands out shared references only.
///
/// `now` is threaded through every hook, in the same unit as
/// [`WaitingSession::enqueued_at`], so a policy can loosen its criteria
/// the longer a session has waited.
pub trait MatchPolicy: Send + Sync + 'static {
    /// Session identity used as the pool key and game member id.
    type SessionId: SessionKey;

    /// Number of sessions that form one game. Default: 2.
    fn group_size(&self) -> usize {
        2
    }

    /// Puts candidates into consumption order.
    ///
    /// `candidates` arrives in pool iteration order. Reordering it changes
    /// who is matched with whom; removing entries holds them back for this
    /// round. Default: leave pool order untouched.
    fn order(&self, _candidates: &mut Vec<&WaitingSession<Self::SessionId>>, _now: u64) {}

    /// Mints the id for the next produced game.
    ///
    /// Called once per game, several times in one pass when the pool fills
    /// more than one group, all with the same `now`. Every call must return
    /// an id no earlier game has used, so `now` alone is not enough.
    /// Default: [`mint_game_id`].
    fn game_id(&self, now: u64) -> GameId {
        mint_game_id(now)
    }

    /// Builds the payload for a game made of `sessions`.
    ///
    /// The returned object gets `"matched": true`, `game_id` and
    /// `session_list` set by [`Game`](crate::Game) regardless of what the
    /// policy put there. Default: `{"matched": true}`.
    fn build_game(&self, _sessions: &[Self::SessionId], _id: GameId, _now: u64) -> Value {
        let mut map = Map::new();
        map.insert(MATCHED_FIELD.to_owned(), Value::Bool(true));
        Value::Object(map)
    }
}

/// Order in which [`DefaultPolicy`] consumes waiting sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumptionOrder {
    /// The pool's own iteration order.
    #[default]
    PoolOrder,
    /// Longest-waiting first; ties keep pool order.
    OldestFirst,
}

/// Groups sessions into fixed-size games with a `{"matched": true}` payload.
pub struct DefaultPolicy<K = SessionId> {
    group_size: usize,
    order: ConsumptionOrder,
    _key: PhantomData<fn() -> K>,
}

impl<K> DefaultPolicy<K> {
    /// Pairs sessions in pool order.
    pub fn new() -> Self {
        Self {
            group_size: 2,
            order: ConsumptionOrder::PoolOrder,
            _key: PhantomData,
        }
    }

    /// Sets the number of sessions per game (at least 1).
    #[must_use]
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    /// Sets the consumption order.
    #[must_use]
    pub fn with_order(mut self, order: ConsumptionOrder) -> Self {
        self.order = order;
        self
    }
}

impl<K> Default for DefaultPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for DefaultPolicy<K> {
    fn clone(&self) -> Self {
        Self {
            group_size: self.group_size,
            order: self.order,
            _key: PhantomData,
        }
    }
}

impl<K> fmt::Debug for DefaultPolicy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPolicy")
            .field("group_size", &self.group_size)
            .field("order", &self.order)
            .finish()
    }
}

impl<K: SessionKey> MatchPolicy for DefaultPolicy<K> {
    type SessionId = K;

    fn group_size(&self) -> usize {
        self.group_size
    }

    fn order(&self, candidates: &mut Vec<&WaitingSession<K>>, _now: u64) {
        if self.order == ConsumptionOrder::OldestFirst {
            // Stable, so equal enqueue times keep pool order.
            candidates.sort_by_key(|s| s.enqueued_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_pairs() {
        let policy: DefaultPolicy = DefaultPolicy::new();
        assert_eq!(MatchPolicy::group_size(&policy), 2);
    }

    #[test]
    fn test_group_size_is_at_least_one() {
        let policy: DefaultPolicy<u64> = DefaultPolicy::new().with_group_size(0);
        assert_eq!(MatchPolicy::group_size(&policy), 1);
    }

    #[test]
    fn test_default_payload_is_matched_true() {
        let policy: DefaultPolicy<u64> = DefaultPolicy::new();
        let payload = policy.build_game(&[1, 2], GameId(3), 0);
        assert_eq!(payload, serde_json::json!({ "matched": true }));
    }

    #[test]
    fn test_oldest_first_orders_by_enqueue_time() {
        let a = WaitingSession::new(1u64, 30);
        let b = WaitingSession::new(2u64, 10);
        let c = WaitingSession::new(3u64, 30);
        let d = WaitingSession::new(4u64, 0);
        let mut candidates = vec![&a, &b, &c, &d];

        let policy: DefaultPolicy<u64> =
            DefaultPolicy::new().with_order(ConsumptionOrder::OldestFirst);
        policy.order(&mut candidates, 100);

        let ids: Vec<u64> = candidates.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_pool_order_leaves_candidates_alone() {
        let a = WaitingSession::new(1u64, 30);
        let b = WaitingSession::new(2u64, 10);
        let mut candidates = vec![&a, &b];
        DefaultPolicy::<u64>::new().order(&mut candidates, 100);
        let ids: Vec<u64> = candidates.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_minted_ids_are_fresh_even_for_the_same_time() {
        let first = mint_game_id(5);
        let second = mint_game_id(5);
        let third = mint_game_id(0);
        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn test_minted_id_follows_a_later_clock() {
        let earlier = mint_game_id(1);
        let ahead = earlier.0 + 1_000;
        let later = mint_game_id(ahead);
        assert!(later > earlier);
        assert!(later.0 >= ahead);
    }
}
