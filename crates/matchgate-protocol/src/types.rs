//! Core protocol types: identities, the bearer token, and match payloads.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identity of one authenticated session, as yielded by token verification.
///
/// Serialized as a plain number (`#[serde(transparent)]`), so a
/// `SessionId(42)` appears as `42` in a game's `session_list`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Identifier minted for each produced game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// Opaque bearer credential presented when a session opens.
///
/// Verification is delegated to an external service; this type only
/// carries the string. `Debug` never prints the value so tokens don't end
/// up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wraps a raw credential string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw credential, e.g. to put it on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// Match payloads
// ---------------------------------------------------------------------------

/// Name of the boolean field every match payload carries.
pub const MATCHED_FIELD: &str = "matched";

/// The canonical cancellation payload: `{"matched": false}`.
///
/// Sent to a session whose pending match request was withdrawn, timed out,
/// or could not be completed. It carries no other fields.
pub fn cancel_payload() -> Value {
    let mut map = Map::new();
    map.insert(MATCHED_FIELD.to_owned(), Value::Bool(false));
    Value::Object(map)
}

/// Reads the boolean `matched` field of a payload.
///
/// Returns `None` if the payload is not an object, has no `matched` field,
/// or the field is not a boolean.
pub fn matched_flag(payload: &Value) -> Option<bool> {
    payload.get(MATCHED_FIELD).and_then(Value::as_bool)
}

/// A match payload as seen by a client.
///
/// `matched: true` payloads carry policy-defined game data (at least
/// `game_id` and `session_list` when produced by the matchmaker), which is
/// kept verbatim in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Whether a game was formed.
    pub matched: bool,

    /// Every other field of the payload.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl MatchOutcome {
    /// Returns `true` for the bare cancellation payload.
    pub fn is_cancelled(&self) -> bool {
        !self.matched
    }
}

// =========================================================================
// Tests
// =========================================================================
