//! Codec trait and implementations for text frames.
//!
//! Frames on a Matchgate session are text, so a codec maps values to and
//! from `String`. [`JsonCodec`] is the only implementation; the trait keeps
//! the server generic so a different text encoding can be swapped in.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust values to text and decode text back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or doesn't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use matchgate_protocol::{Codec, JsonCodec, MatchOutcome};
///
/// let codec = JsonCodec;
/// let outcome: MatchOutcome = codec.decode(r#"{"matched":false}"#).unwrap();
/// assert!(!outcome.matched);
/// assert_eq!(codec.encode(&outcome).unwrap(), r#"{"matched":false}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
