//! The `Game` record: membership, identifier, and payload of a matched group.

use matchgate_protocol::{matched_flag, GameId, MATCHED_FIELD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::SessionKey;

const GAME_ID_FIELD: &str = "game_id";
const SESSION_LIST_FIELD: &str = "session_list";

/// A matched group of sessions.
///
/// On the wire a game is one JSON object: the policy payload (which always
/// has `"matched": true`) plus `game_id` and `session_list`:
///
/// ```json
/// {"matched": true, "game_id": 87, "session_list": [8, 915]}
/// ```
///
/// Games built by the matchmaker are always valid and not done. Games
/// rebuilt from JSON with [`Game::from_json`] never fail; a payload that
/// doesn't hold up is reported through [`is_valid`](Self::is_valid).
#[derive(Debug, Clone, PartialEq)]
pub struct Game<K> {
    /// Members in consumption order. The order is a stable tie-break, e.g.
    /// for assigning roles.
    pub session_list: Vec<K>,
    /// Freshly minted identifier.
    pub id: GameId,
    /// Policy-defined payload, without `game_id` and `session_list`.
    pub data: Value,
    done: bool,
    valid: bool,
}

impl<K: SessionKey> Game<K> {
    /// Creates a freshly matched game.
    ///
    /// `payload` is forced to be an object with `"matched": true`; a
    /// non-object payload is kept under a `"payload"` key.
    pub fn new(session_list: Vec<K>, id: GameId, payload: Value) -> Self {
        let mut data = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("payload".to_owned(), other);
                map
            }
        };
        data.insert(MATCHED_FIELD.to_owned(), Value::Bool(true));
        data.remove(GAME_ID_FIELD);
        data.remove(SESSION_LIST_FIELD);

        Self {
            session_list,
            id,
            data: Value::Object(data),
            done: false,
            valid: true,
        }
    }

    /// Rebuilds a game from a previously serialized payload.
    ///
    /// Never fails. The result is valid only if `matched` is the boolean
    /// `true` and any `game_id` / `session_list` fields have the right
    /// shape; missing membership fields default to empty.
    pub fn from_json(value: Value) -> Self {
        let mut valid = matched_flag(&value) == Some(true);

        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Self {
                    session_list: Vec::new(),
                    id: GameId::default(),
                    data: other,
                    done: false,
                    valid: false,
                };
            }
        };

        let session_list = match map.remove(SESSION_LIST_FIELD) {
            None => Vec::new(),
            Some(raw) => serde_json::from_value(raw).unwrap_or_else(|_| {
                valid = false;
                Vec::new()
            }),
        };
        let id = match map.remove(GAME_ID_FIELD) {
            None => GameId::default(),
            Some(raw) => serde_json::from_value(raw).unwrap_or_else(|_| {
                valid = false;
                GameId::default()
            }),
        };

        Self {
            session_list,
            id,
            data: Value::Object(map),
            done: false,
            valid,
        }
    }

    /// Serializes the game into its wire payload.
    pub fn to_json(&self) -> Value {
        let mut map = match &self.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        map.insert(
            GAME_ID_FIELD.to_owned(),
            serde_json::to_value(self.id).unwrap_or(Value::Null),
        );
        map.insert(
            SESSION_LIST_FIELD.to_owned(),
            serde_json::to_value(&self.session_list).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }

    /// `true` if the payload carried a boolean `matched: true` and
    /// well-formed membership fields.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `true` once external game-progress events finished the game.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Marks the game finished.
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Returns `true` if `id` is a member of this game.
    pub fn contains(&self, id: &K) -> bool {
        self.session_list.contains(id)
    }
}

impl<K: SessionKey> Serialize for Game<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de, K: SessionKey> Deserialize<'de> for Game<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_game_has_empty_session_list() {
        let game: Game<u64> = Game::new(Vec::new(), GameId(0), Value::Null);
        assert!(game.session_list.is_empty());
        assert_eq!(game.data["matched"], true);
        assert!(game.is_valid());
        assert!(!game.is_done());
    }

    #[test]
    fn test_two_player_game_tracks_members_and_id() {
        let game: Game<u64> = Game::new(vec![8, 915], GameId(87), json!({ "matched": true }));
        assert_eq!(game.session_list, vec![8, 915]);
        assert_eq!(game.id, GameId(87));
        assert_eq!(game.data["matched"], true);
        assert!(game.contains(&915));
        assert!(!game.contains(&7));
    }

    #[test]
    fn test_new_forces_matched_true() {
        let game: Game<u64> = Game::new(vec![1], GameId(1), json!({ "matched": false, "map": "dunes" }));
        assert_eq!(game.data, json!({ "matched": true, "map": "dunes" }));

        let wrapped: Game<u64> = Game::new(vec![1], GameId(1), json!(42));
        assert_eq!(wrapped.data, json!({ "matched": true, "payload": 42 }));
    }

    #[test]
    fn test_to_json_includes_membership() {
        let game: Game<u64> = Game::new(vec![9, 3241], GameId(5), json!({ "matched": true }));
        assert_eq!(
            game.to_json(),
            json!({ "matched": true, "game_id": 5, "session_list": [9, 3241] })
        );
    }

    #[test]
    fn test_from_json_matched_true_is_valid() {
        let game: Game<u64> = Game::from_json(json!({ "matched": true }));
        assert!(game.is_valid());
        assert!(!game.is_done());
        assert!(game.session_list.is_empty());
    }

    #[test]
    fn test_from_json_matched_false_is_not_valid() {
        let game: Game<u64> = Game::from_json(json!({ "matched": false }));
        assert!(!game.is_valid());
        assert!(!game.is_done());
    }

    #[test]
    fn test_from_json_mistyped_matched_is_not_valid() {
        let game: Game<u64> = Game::from_json(json!({ "matched": "oops" }));
        assert!(!game.is_valid());
        assert!(!game.is_done());
    }

    #[test]
    fn test_from_json_missing_matched_or_non_object_is_not_valid() {
        assert!(!Game::<u64>::from_json(json!({})).is_valid());
        assert!(!Game::<u64>::from_json(json!([1, 2])).is_valid());
        assert!(!Game::<u64>::from_json(Value::Null).is_valid());
    }

    #[test]
    fn test_from_json_mistyped_session_list_is_not_valid() {
        let game: Game<u64> =
            Game::from_json(json!({ "matched": true, "session_list": "everyone" }));
        assert!(!game.is_valid());
        assert!(game.session_list.is_empty());
    }

    #[test]
    fn test_serialized_game_rehydrates_identically() {
        let game: Game<u64> =
            Game::new(vec![4, 2], GameId(77), json!({ "matched": true, "mode": "duel" }));
        let text = serde_json::to_string(&game).unwrap();
        let back: Game<u64> = serde_json::from_str(&text).unwrap();

        assert!(back.is_valid());
        assert_eq!(back.session_list, game.session_list);
        assert_eq!(back.id, game.id);
        assert_eq!(back.data, game.data);
        assert_eq!(back, game);
    }

    #[test]
    fn test_mark_done() {
        let mut game: Game<u64> = Game::new(vec![1, 2], GameId(1), Value::Null);
        game.mark_done();
        assert!(game.is_done());
        assert!(game.is_valid());
    }
}
