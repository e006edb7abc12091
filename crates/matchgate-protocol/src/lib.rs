//! Wire protocol for Matchgate.
//!
//! This crate defines what travels between clients and the matchmaking
//! server:
//!
//! - **Identity types** ([`SessionId`], [`GameId`], [`Token`]).
//! - **Match payloads** ([`MatchOutcome`], [`cancel_payload`]): every
//!   payload the server delivers carries a boolean `matched` field.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how values become text
//!   frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (text frames) → Protocol (payloads) → Session / Match
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    cancel_payload, matched_flag, GameId, MatchOutcome, SessionId, Token,
    MATCHED_FIELD,
};
