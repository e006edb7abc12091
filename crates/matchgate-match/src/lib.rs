//! Matchmaking engine for Matchgate.
//!
//! Turns a pool of waiting sessions into [`Game`] records. The engine is
//! synchronous and never touches the pool it reads: evicting matched
//! sessions is left to the caller so it can be combined with notifying
//! and closing their connections.
//!
//! # Key types
//!
//! - [`MatchPolicy`]: the pluggable rule set (group size, consumption
//!   order, game ids, game payloads)
//! - [`DefaultPolicy`]: pairs sessions in pool order
//! - [`Matchmaker`]: runs a policy against a pool
//! - [`Game`]: a matched group's serializable record
//! - [`SessionPool`] / [`WaitingPool`]: what the engine reads from

mod game;
mod matchmaker;
mod policy;
mod pool;

pub use game::Game;
pub use matchmaker::Matchmaker;
pub use policy::{mint_game_id, ConsumptionOrder, DefaultPolicy, MatchPolicy};
pub use pool::{SessionKey, SessionPool, WaitingPool, WaitingSession};
