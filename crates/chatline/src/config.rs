//! Client configuration.

use std::path::PathBuf;

use chatline_session::SessionConfig;

const ENV_BACKEND_URL: &str = "CHATLINE_BACKEND_URL";
const ENV_STORAGE_DIR: &str = "CHATLINE_STORAGE_DIR";
const ENV_REALTIME_PATH: &str = "CHATLINE_REALTIME_PATH";

/// Where the client connects and where it keeps its credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the auth API. The realtime endpoint is resolved
    /// against it. There is no default; the backend has to serve the
    /// realtime protocol this client speaks.
    pub backend_url: Option<String>,

    /// Directory the credential is persisted in.
    pub storage_dir: PathBuf,

    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            storage_dir: default_storage_dir(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `CHATLINE_BACKEND_URL`,
    /// `CHATLINE_STORAGE_DIR` and `CHATLINE_REALTIME_PATH` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(url) = var(ENV_BACKEND_URL) {
            config.backend_url = Some(url);
        }
        if let Some(dir) = var(ENV_STORAGE_DIR) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(path) = var(ENV_REALTIME_PATH) {
            config.session.realtime_path = path;
        }
        config
    }
}

/// `<platform data dir>/chatline`, or `./.chatline` if the platform has
/// no data directory.
pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("chatline"))
        .unwrap_or_else(|| PathBuf::from(".chatline"))
}
