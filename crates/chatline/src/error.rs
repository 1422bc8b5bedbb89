//! Unified error type for the Chatline client.

use chatline_protocol::ProtocolError;
use chatline_session::SessionError;
use chatline_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `chatline` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatlineError {
    /// A transport-level error (request, connect, bad URL).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, missing fields).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (rejected, busy, not authenticated).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client configuration can't be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatlineError {
    /// Returns `true` if the backend explicitly refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Session(SessionError::AuthRejected(_)))
    }

    /// Returns `false` for outcomes the user doesn't need to see, such as
    /// an operation that lost to a concurrent one.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::Session(e) => e.is_user_facing(),
            _ => true,
        }
    }
}
