//! Session configuration.

use std::time::Duration;

use chatline_protocol::ROSTER_EVENT;
use chatline_transport::{DEFAULT_CONNECT_TIMEOUT, OpenOptions};

/// Configuration for session behavior.
///
/// Sensible defaults are provided; override just the fields you care
/// about with struct-update syntax:
///
/// ```rust
/// use chatline_session::SessionConfig;
///
/// let config = SessionConfig {
///     realtime_path: "/socket".into(),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.credential_key, "token");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Key the bearer token is persisted under.
    pub credential_key: String,

    /// Path of the realtime endpoint, resolved against the backend URL.
    pub realtime_path: String,

    /// Name of the realtime event carrying the online-user roster.
    pub roster_event: String,

    /// Send backend cookies along with HTTP requests and the realtime
    /// connection request.
    pub with_credentials: bool,

    /// How long opening the realtime channel may take before it fails.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential_key: "token".to_string(),
            realtime_path: "/ws".to_string(),
            roster_event: ROSTER_EVENT.to_string(),
            with_credentials: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// The options every realtime channel is opened with.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions {
            with_credentials: self.with_credentials,
            roster_event: self.roster_event.clone(),
            connect_timeout: self.connect_timeout,
        }
    }
}
