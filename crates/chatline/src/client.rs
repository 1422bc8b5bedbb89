//! `ChatlineClient` builder and the wired-up session it exposes.
//!
//! This is the entry point for applications. It ties together all the
//! layers: reqwest for the auth API, a WebSocket per realtime channel,
//! the credential file on disk and the session coordinator on top.

use std::path::PathBuf;
use std::sync::Arc;

use chatline_protocol::{AuthMode, AuthRequest, Identity, PresenceSet, ProfileUpdate};
use chatline_session::{
    ChannelManager, ChannelSnapshot, ChannelState, FileStore, Notifier,
    SessionConfig, SessionCoordinator, TracingNotifier,
};
use chatline_transport::{CookieJar, ReqwestApi, Url, WebSocketTransport};
use tokio::sync::watch;

use crate::{ChatlineError, ClientConfig};

/// The coordinator type a [`ChatlineClient`] runs.
pub type ClientSession<N> = SessionCoordinator<ReqwestApi, N, FileStore>;

/// Builder for configuring a [`ChatlineClient`].
///
/// # Example
///
/// ```rust,no_run
/// use chatline::prelude::*;
///
/// # async fn run() -> Result<(), ChatlineError> {
/// let client = ChatlineClient::builder()
///     .backend_url("http://localhost:5000")
///     .storage_dir("/tmp/chatline")
///     .build()?;
/// client.resume_session().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChatlineClientBuilder<N = TracingNotifier> {
    config: ClientConfig,
    notifier: N,
}

impl ChatlineClientBuilder {
    /// Creates a builder with default settings that reports to `tracing`.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            notifier: TracingNotifier,
        }
    }
}

impl Default for ChatlineClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Notifier> ChatlineClientBuilder<N> {
    /// Sets the base URL of the backend.
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend_url = Some(url.into());
        self
    }

    /// Sets the directory the credential is stored in.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Replaces the whole configuration, e.g. with
    /// [`ClientConfig::from_env`].
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sends user-facing notifications to `notifier` instead of the log.
    pub fn notifier<M: Notifier>(self, notifier: M) -> ChatlineClientBuilder<M> {
        ChatlineClientBuilder {
            config: self.config,
            notifier,
        }
    }

    /// Wires up the client. Doesn't touch the network or the disk.
    ///
    /// Fails if no backend URL was set. Must be called from within a Tokio
    /// runtime: the realtime channel manager is spawned here.
    pub fn build(self) -> Result<ChatlineClient<N>, ChatlineError> {
        let config = self.config;
        let Some(backend_url) = config.backend_url.as_deref() else {
            return Err(ChatlineError::Config(
                "no backend url configured; set CHATLINE_BACKEND_URL".into(),
            ));
        };
        let base = Url::parse(backend_url).map_err(|e| {
            ChatlineError::Config(format!("backend url {backend_url:?}: {e}"))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ChatlineError::Config(format!(
                "backend url must be http or https, got {}",
                base.scheme()
            )));
        }
        let target = base.join(&config.session.realtime_path).map_err(|e| {
            ChatlineError::Config(format!(
                "realtime path {:?}: {e}",
                config.session.realtime_path
            ))
        })?;

        let (api, transport) = if config.session.with_credentials {
            let jar = Arc::new(CookieJar::default());
            (
                ReqwestApi::with_cookies(base, Arc::clone(&jar))?,
                WebSocketTransport::with_cookies(jar),
            )
        } else {
            (ReqwestApi::new(base)?, WebSocketTransport::new())
        };

        let channel =
            ChannelManager::spawn(transport, target, config.session.open_options());
        let store = FileStore::new(&config.storage_dir);
        let session =
            SessionCoordinator::new(api, store, self.notifier, channel, &config.session);

        tracing::debug!(
            backend = backend_url,
            storage = %config.storage_dir.display(),
            "chatline client ready"
        );
        Ok(ChatlineClient {
            session: Arc::new(session),
            config,
        })
    }
}

/// A chat client session: credential on disk, identity, realtime presence.
///
/// Cheap to clone; clones share the same session.
pub struct ChatlineClient<N = TracingNotifier> {
    session: Arc<ClientSession<N>>,
    config: ClientConfig,
}

impl ChatlineClient {
    /// Creates a new builder.
    pub fn builder() -> ChatlineClientBuilder {
        ChatlineClientBuilder::new()
    }
}

impl<N: Notifier> ChatlineClient<N> {
    /// Restores the session saved by a previous run, if any.
    pub async fn resume_session(&self) -> Result<Option<Identity>, ChatlineError> {
        Ok(self.session.resume_session().await?)
    }

    /// Signs up or logs in.
    pub async fn login(
        &self,
        mode: AuthMode,
        request: &AuthRequest,
    ) -> Result<Identity, ChatlineError> {
        Ok(self.session.login(mode, request).await?)
    }

    /// Ends the session.
    pub async fn logout(&self) -> Result<(), ChatlineError> {
        Ok(self.session.logout().await?)
    }

    /// Updates the current user's profile.
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<Identity, ChatlineError> {
        Ok(self.session.update_profile(update).await?)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn presence(&self) -> PresenceSet {
        self.session.presence()
    }

    pub fn is_channel_connected(&self) -> bool {
        self.session.is_channel_connected()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.session.channel_state()
    }

    pub fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.session.subscribe_identity()
    }

    pub fn subscribe_channel(&self) -> watch::Receiver<ChannelSnapshot> {
        self.session.subscribe_channel()
    }

    /// The underlying coordinator.
    pub fn session(&self) -> &Arc<ClientSession<N>> {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Closes the realtime channel and stops its task. The stored
    /// credential is kept, so the next run can resume.
    pub async fn shutdown(&self) -> Result<(), ChatlineError> {
        Ok(self.session.channel().shutdown().await?)
    }
}

impl<N> Clone for ChatlineClient<N> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            config: self.config.clone(),
        }
    }
}

impl<N> std::fmt::Debug for ChatlineClient<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatlineClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}
