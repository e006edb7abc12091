//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into a text frame).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a text frame into a Rust value).
    ///
    /// Common causes: malformed JSON, missing required fields, or wrong
    /// data types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates the payload contract, e.g. a match
    /// payload without a boolean `matched` field.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
