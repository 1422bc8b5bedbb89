//! Error types for the session layer.

use chatline_protocol::ProtocolError;
use chatline_transport::TransportError;

/// Errors that can occur while managing the session.
///
/// The `Display` text of each variant is what the user is shown through
/// the [`Notifier`](crate::Notifier), so `AuthRejected` prints the
/// backend's message and nothing else.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend explicitly refused: bad password, duplicate account,
    /// expired session, rejected profile update. Carries the backend's
    /// human-readable message.
    #[error("{0}")]
    AuthRejected(String),

    /// The HTTP or realtime round trip could not complete.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered, but not with something usable (e.g. a
    /// successful login without a token).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The operation needs a logged-in session and there isn't one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Another login, resume or profile update is still in flight.
    #[error("another session operation is already in progress")]
    Busy,

    /// The session was logged out while this operation was in flight, so
    /// its result was discarded.
    #[error("session changed while the operation was in flight")]
    Superseded,

    /// The realtime channel manager task is gone.
    #[error("realtime channel manager is unavailable")]
    ChannelUnavailable,
}

impl SessionError {
    /// Returns `true` for errors the user should hear about.
    ///
    /// `Busy` and `Superseded` are coordination outcomes: the user already
    /// has an answer from the operation that won.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Busy | Self::Superseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejected_displays_message_verbatim() {
        let err = SessionError::AuthRejected("Invalid credentials".into());
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_from_transport_error() {
        let err: SessionError = TransportError::Status { status: 502 }.into();
        assert!(matches!(err, SessionError::Transport(_)));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_is_user_facing() {
        assert!(SessionError::NotAuthenticated.is_user_facing());
        assert!(SessionError::AuthRejected("x".into()).is_user_facing());
        assert!(!SessionError::Busy.is_user_facing());
        assert!(!SessionError::Superseded.is_user_facing());
    }
}
