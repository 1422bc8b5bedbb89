//! Error types for the protocol layer.
//!
//! Each crate in Chatline defines its own error enum. A `ProtocolError`
//! always means "the bytes were wrong", never "the network was down" or
//! "the backend said no".

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: an HTML error page where JSON was expected, a
    /// truncated body, or a field with the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but is missing something the caller needs,
    /// e.g. a successful login response without a token.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
