//! The session coordinator: one owner for credential, identity and channel.
//!
//! Every change to the session goes through one of four operations
//! ([`resume_session`], [`login`], [`logout`], [`update_profile`]), which
//! keep the three pieces consistent with each other:
//!
//! - a current identity exists iff a credential is stored
//! - a realtime channel is open iff a current identity exists
//! - presence is empty whenever no channel is connected
//!
//! # Concurrency
//!
//! `login`, `resume_session` and `update_profile` are single-flight: while
//! one is running, another fails fast with [`SessionError::Busy`].
//! `logout` never waits for them. It bumps the session epoch instead, and
//! an operation that finishes under a stale epoch throws its result away
//! ([`SessionError::Superseded`]). The guard covers the network round trip
//! and the commit, not the wait for the realtime channel to open.
//!
//! Identity changes and the matching channel command are issued under the
//! same lock, so the channel actor sees connects and disconnects in the
//! order the identity changed.
//!
//! [`resume_session`]: SessionCoordinator::resume_session
//! [`login`]: SessionCoordinator::login
//! [`logout`]: SessionCoordinator::logout
//! [`update_profile`]: SessionCoordinator::update_profile

use std::sync::{Mutex, MutexGuard, PoisonError};

use chatline_protocol::{
    AuthMode, AuthRequest, Credential, Identity, PresenceSet, ProfileUpdate,
};
use chatline_transport::HttpApi;
use tokio::sync::{oneshot, watch};

use crate::channel::{ChannelManager, ChannelSnapshot, ChannelState};
use crate::resolver::{Authenticated, IdentityResolver};
use crate::store::{CredentialStore, KeyValueStore};
use crate::{Notifier, SessionConfig, SessionError};

type ConnectReply = oneshot::Receiver<Result<(), SessionError>>;

/// Mutable session state guarded by the coordinator's state lock.
#[derive(Debug, Default)]
struct SessionState {
    /// Bumped by every logout.
    epoch: u64,
    /// The credential sent with authenticated requests.
    credential: Option<Credential>,
}

/// Owns the session and exposes it read-only.
///
/// Share it across tasks with an `Arc`. The type parameters are the HTTP
/// capability, the notifier and the persistent store, so tests can swap
/// any of them for an in-process mock.
pub struct SessionCoordinator<H, N, S> {
    resolver: IdentityResolver<H>,
    credentials: CredentialStore<S>,
    channel: ChannelManager,
    notifier: N,
    state: Mutex<SessionState>,
    in_flight: tokio::sync::Mutex<()>,
    identity: watch::Sender<Option<Identity>>,
}

impl<H, N, S> SessionCoordinator<H, N, S>
where
    H: HttpApi,
    N: Notifier,
    S: KeyValueStore,
{
    /// Creates a logged-out coordinator.
    ///
    /// Nothing is read from `store` until [`resume_session`] is called.
    ///
    /// [`resume_session`]: Self::resume_session
    pub fn new(
        api: H,
        store: S,
        notifier: N,
        channel: ChannelManager,
        config: &SessionConfig,
    ) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            resolver: IdentityResolver::new(api),
            credentials: CredentialStore::new(store, config.credential_key.clone()),
            channel,
            notifier,
            state: Mutex::new(SessionState::default()),
            in_flight: tokio::sync::Mutex::new(()),
            identity,
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Restores the session from a previously stored credential.
    ///
    /// Meant to run once at startup. Returns `Ok(None)` without notifying
    /// anyone if nothing is stored. If the stored credential no longer
    /// works, the failure is reported and the session is logged out.
    pub async fn resume_session(&self) -> Result<Option<Identity>, SessionError> {
        let guard = self.in_flight.try_lock().map_err(|_| SessionError::Busy)?;

        let Some(credential) = self.credentials.load() else {
            tracing::debug!("no stored credential, starting logged out");
            return Ok(None);
        };
        let epoch = self.lock_state().epoch;

        match self.resolver.verify(&credential).await {
            Ok(identity) => {
                let connect = self.commit(epoch, identity.clone(), credential, false)?;
                tracing::info!(user_id = %identity.id, "session resumed");
                drop(guard);
                self.await_connect(connect).await;
                Ok(Some(identity))
            }
            Err(e) => {
                self.ensure_current(epoch)?;
                tracing::warn!(error = %e, "stored credential rejected");
                self.notifier.notify_failure(&e.to_string());
                let _ = self.logout().await;
                Err(e)
            }
        }
    }

    /// Signs up or logs in, then opens the realtime channel.
    ///
    /// A rejected attempt leaves any existing session exactly as it was.
    /// The session is committed before the channel is opened, so other
    /// operations may run while the connection is still being set up.
    pub async fn login(
        &self,
        mode: AuthMode,
        request: &AuthRequest,
    ) -> Result<Identity, SessionError> {
        let guard = self.in_flight.try_lock().map_err(|_| SessionError::Busy)?;
        let epoch = self.lock_state().epoch;

        match self.resolver.authenticate(mode, request).await {
            Ok(Authenticated {
                identity,
                credential,
                message,
            }) => {
                let connect = self.commit(epoch, identity.clone(), credential, true)?;
                tracing::info!(user_id = %identity.id, %mode, "session established");
                let message = message.unwrap_or_else(|| format!("{mode} successful"));
                self.notifier.notify_success(&message);
                drop(guard);
                self.await_connect(connect).await;
                Ok(identity)
            }
            Err(e) => {
                self.ensure_current(epoch)?;
                tracing::info!(%mode, error = %e, "authentication failed");
                self.notifier.notify_failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// Ends the session: forgets the credential and identity and closes
    /// the channel. Safe to call at any time, any number of times.
    ///
    /// Any login, resume or profile update still in flight is superseded.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let disconnect = {
            let mut state = self.lock_state();
            state.epoch += 1;
            state.credential = None;
            self.credentials.clear();
            self.identity.send_replace(None);
            self.channel.request_disconnect()
        };

        let result = match disconnect {
            Ok(reply) => reply.await.map_err(|_| SessionError::ChannelUnavailable),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::warn!(error = %e, "could not close realtime channel on logout");
        }

        tracing::info!("logged out");
        self.notifier.notify_success("Logged out successfully");
        result
    }

    /// Updates the current user's profile and replaces the identity with
    /// the backend's answer.
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<Identity, SessionError> {
        let _guard = self.in_flight.try_lock().map_err(|_| SessionError::Busy)?;
        let (epoch, credential) = {
            let state = self.lock_state();
            (state.epoch, state.credential.clone())
        };
        let Some(credential) = credential.filter(|_| self.is_authenticated()) else {
            return Err(SessionError::NotAuthenticated);
        };

        match self.resolver.update_profile(&credential, update).await {
            Ok(identity) => {
                {
                    let state = self.lock_state();
                    if state.epoch != epoch {
                        return Err(SessionError::Superseded);
                    }
                    self.identity.send_replace(Some(identity.clone()));
                }
                tracing::info!(user_id = %identity.id, "profile updated");
                self.notifier.notify_success("Profile updated successfully");
                Ok(identity)
            }
            Err(e) => {
                self.ensure_current(epoch)?;
                tracing::info!(error = %e, "profile update failed");
                self.notifier.notify_failure(&e.to_string());
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Read-only state
    // -----------------------------------------------------------------------

    /// The current user, if logged in.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// A receiver notified on every identity change.
    pub fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.borrow().is_some()
    }

    /// The credential sent with authenticated requests.
    pub fn credential(&self) -> Option<Credential> {
        self.lock_state().credential.clone()
    }

    pub fn presence(&self) -> PresenceSet {
        self.channel.presence()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn is_channel_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn subscribe_channel(&self) -> watch::Receiver<ChannelSnapshot> {
        self.channel.subscribe()
    }

    /// The channel manager this coordinator drives.
    pub fn channel(&self) -> &ChannelManager {
        &self.channel
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_current(&self, epoch: u64) -> Result<(), SessionError> {
        if self.lock_state().epoch == epoch {
            Ok(())
        } else {
            Err(SessionError::Superseded)
        }
    }

    /// Installs `identity` and `credential` and enqueues the channel for
    /// them, unless a logout happened since `epoch`.
    ///
    /// A freshly issued credential (`is_new`) is persisted and always gets
    /// a fresh channel, even for the same user.
    fn commit(
        &self,
        epoch: u64,
        identity: Identity,
        credential: Credential,
        is_new: bool,
    ) -> Result<Option<ConnectReply>, SessionError> {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            tracing::debug!(user_id = %identity.id, "discarding result from before logout");
            return Err(SessionError::Superseded);
        }

        if is_new {
            self.credentials.save(&credential);
            // The reply only confirms the close; the connect below is what
            // the caller waits on.
            let _ = self.channel.request_disconnect();
        }
        state.credential = Some(credential);
        let connect = match self.channel.request_connect(&identity.id) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(user_id = %identity.id, error = %e, "realtime channel unavailable");
                None
            }
        };
        self.identity.send_replace(Some(identity));
        Ok(connect)
    }

    /// Waits for the channel to accept a connect. A failed connect doesn't
    /// undo the session; it just leaves it offline.
    async fn await_connect(&self, connect: Option<ConnectReply>) {
        let Some(reply) = connect else { return };
        let result = reply
            .await
            .unwrap_or(Err(SessionError::ChannelUnavailable));
        if let Err(e) = result {
            tracing::warn!(error = %e, "session established without realtime channel");
        }
    }
}

impl<H, N, S> std::fmt::Debug for SessionCoordinator<H, N, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("identity", &*self.identity.borrow())
            .field("channel", &self.channel.snapshot())
            .finish_non_exhaustive()
    }
}
