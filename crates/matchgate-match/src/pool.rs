//! Waiting sessions and the pools that hold them.
//!
//! The engine only reads pools through [`SessionPool`], so callers can keep
//! whatever collection suits them. Iteration order is the default
//! consumption order: a `HashMap` pool matches in arbitrary order, while
//! [`WaitingPool`] and `BTreeMap` give repeatable results.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Identity of a session as used for pool keys and game membership.
///
/// Blanket-implemented for every type with the required bounds, e.g.
/// [`SessionId`](matchgate_protocol::SessionId) or a plain `u64`.
pub trait SessionKey:
    Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> SessionKey for T where
    T: Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// One authenticated session waiting to be matched.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingSession<K> {
    /// Which session this is.
    pub id: K,
    /// Matching data; only the active policy interprets it.
    pub data: Value,
    /// When the session entered the pool, in milliseconds on the caller's
    /// clock (the same clock passed to `match_sessions`).
    pub enqueued_at: u64,
}

impl<K> WaitingSession<K> {
    /// Creates an entry with empty (`null`) matching data.
    pub fn new(id: K, enqueued_at: u64) -> Self {
        Self {
            id,
            data: Value::Null,
            enqueued_at,
        }
    }

    /// Sets the matching data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// How long this session has waited as of `now`.
    pub fn waited(&self, now: u64) -> u64 {
        now.saturating_sub(self.enqueued_at)
    }
}

/// Read access to a pool of waiting sessions.
pub trait SessionPool {
    /// The session identity used as the pool key.
    type Key: SessionKey;

    /// Number of waiting sessions. Must be O(1).
    fn size(&self) -> usize;

    /// Iterates the waiting sessions in the pool's own order.
    fn sessions(&self) -> impl Iterator<Item = &WaitingSession<Self::Key>>;
}

impl<K, S> SessionPool for HashMap<K, WaitingSession<K>, S>
where
    K: SessionKey,
    S: BuildHasher,
{
    type Key = K;

    fn size(&self) -> usize {
        self.len()
    }

    fn sessions(&self) -> impl Iterator<Item = &WaitingSession<K>> {
        self.values()
    }
}

impl<K> SessionPool for BTreeMap<K, WaitingSession<K>>
where
    K: SessionKey + Ord,
{
    type Key = K;

    fn size(&self) -> usize {
        self.len()
    }

    fn sessions(&self) -> impl Iterator<Item = &WaitingSession<K>> {
        self.values()
    }
}

/// An insertion-ordered pool.
///
/// Sessions are consumed oldest-inserted first under the default policy,
/// which makes matching deterministic.
#[derive(Debug, Clone)]
pub struct WaitingPool<K: SessionKey> {
    entries: Vec<WaitingSession<K>>,
    /// Position of each key in `entries`. Kept in sync on every mutation.
    index: HashMap<K, usize>,
}

impl<K: SessionKey> WaitingPool<K> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Adds a session at the back of the pool.
    ///
    /// If the key is already present the entry is replaced in place (it
    /// keeps its position) and the previous entry is returned.
    pub fn insert(&mut self, session: WaitingSession<K>) -> Option<WaitingSession<K>> {
        match self.index.get(&session.id) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos], session)),
            None => {
                self.index.insert(session.id.clone(), self.entries.len());
                self.entries.push(session);
                None
            }
        }
    }

    /// Removes a session, preserving the order of the others.
    pub fn remove(&mut self, id: &K) -> Option<WaitingSession<K>> {
        let pos = self.index.remove(id)?;
        let removed = self.entries.remove(pos);
        for entry in &self.entries[pos..] {
            if let Some(slot) = self.index.get_mut(&entry.id) {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Replaces a session's matching data. Returns `false` if absent.
    pub fn update_data(&mut self, id: &K, data: Value) -> bool {
        match self.get_mut(id) {
            Some(entry) => {
                entry.data = data;
                true
            }
            None => false,
        }
    }

    /// Returns the waiting entry for `id`.
    pub fn get(&self, id: &K) -> Option<&WaitingSession<K>> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    /// Returns the waiting entry for `id` for in-place changes.
    pub fn get_mut(&mut self, id: &K) -> Option<&mut WaitingSession<K>> {
        let pos = *self.index.get(id)?;
        self.entries.get_mut(pos)
    }

    /// Returns `true` if `id` is waiting.
    pub fn contains(&self, id: &K) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the number of waiting sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, WaitingSession<K>> {
        self.entries.iter()
    }

    /// Keys of sessions that have waited at least `max_wait` ms at `now`.
    pub fn expired(&self, now: u64, max_wait: u64) -> Vec<K> {
        self.entries
            .iter()
            .filter(|s| s.waited(now) >= max_wait)
            .map(|s| s.id.clone())
            .collect()
    }
}

impl<K: SessionKey> Default for WaitingPool<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SessionKey> SessionPool for WaitingPool<K> {
    type Key = K;

    fn size(&self) -> usize {
        self.len()
    }

    fn sessions(&self) -> impl Iterator<Item = &WaitingSession<K>> {
        self.entries.iter()
    }
}

impl<K: SessionKey> FromIterator<WaitingSession<K>> for WaitingPool<K> {
    fn from_iter<I: IntoIterator<Item = WaitingSession<K>>>(iter: I) -> Self {
        let mut pool = Self::new();
        for session in iter {
            pool.insert(session);
        }
        pool
    }
}
