//! Realtime channel manager: an actor task that owns the single channel.
//!
//! All channel state lives inside one Tokio task. The outside world sends
//! it commands over an mpsc queue and reads its state from a `watch`
//! channel. Transports report what happens on the wire through a second,
//! tagged event queue, and the actor works through both queues one message
//! at a time. Nothing else ever touches the channel.
//!
//! ```text
//!   ChannelManager ──commands──▶ ┌──────────────┐ ──open/close──▶ RealtimeTransport
//!                                │ ChannelActor │
//!   ChannelManager ◀──watch───── └──────────────┘ ◀──TaggedEvent── EventSink
//! ```
//!
//! While a channel is being opened the actor keeps reading commands. A
//! `Disconnect` or `Shutdown` abandons the open; a `Connect` waits its turn.
//!
//! There is no automatic reconnect. A channel the server drops stays
//! `Disconnected` until the next `connect` for that user opens a new one.

use chatline_protocol::{Identity, PresenceSet, UserId};
use chatline_transport::{
    ChannelAuth, ChannelEvent, ChannelHandle, ChannelId, EventReceiver,
    EventSink, OpenOptions, RealtimeTransport, TaggedEvent, Url, event_queue,
};
use std::collections::VecDeque;

use tokio::sync::{mpsc, oneshot, watch};

use crate::SessionError;

/// Lifecycle of the realtime channel.
///
/// ```text
///   NoChannel ──connect──▶ Connecting ──Opened──▶ Connected ──Closed──▶ Disconnected
///       ▲                                                                    │
///       └──────────────────────────── disconnect ────────────────────────────┘
/// ```
///
/// `disconnect` returns to `NoChannel` from any state. A `Disconnected`
/// channel is kept until the next `disconnect` or `connect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelState {
    #[default]
    NoChannel,
    Connecting,
    Connected,
    Disconnected,
}

/// Everything observable about the channel at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub state: ChannelState,
    /// The user the channel was opened for.
    pub user_id: Option<UserId>,
    pub channel_id: Option<ChannelId>,
    /// Peers currently online. Empty unless `state` is `Connected`.
    pub presence: PresenceSet,
}

impl ChannelSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    /// Whether a channel for `user_id` is open or being opened.
    fn is_live_for(&self, user_id: &UserId) -> bool {
        self.user_id.as_ref() == Some(user_id)
            && matches!(
                self.state,
                ChannelState::Connecting | ChannelState::Connected
            )
    }
}

/// Commands sent to the channel actor.
pub(crate) enum ChannelCommand {
    /// Make sure a channel for this user is open.
    Connect {
        user_id: UserId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Close the current channel, if any.
    Disconnect { reply: oneshot::Sender<()> },

    /// Close the current channel and stop the actor.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle to the running channel actor.
///
/// Cheap to clone. When the last handle is dropped the actor closes its
/// channel and exits.
#[derive(Debug, Clone)]
pub struct ChannelManager {
    commands: mpsc::UnboundedSender<ChannelCommand>,
    snapshot: watch::Receiver<ChannelSnapshot>,
}

impl ChannelManager {
    /// Spawns the actor on the current Tokio runtime.
    ///
    /// `target` is the realtime endpoint every channel is opened against.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<T: RealtimeTransport>(
        transport: T,
        target: Url,
        options: OpenOptions,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(ChannelSnapshot::default());
        let (events_tx, events_rx) = event_queue();

        let actor = ChannelActor {
            transport,
            target,
            options,
            commands: commands_rx,
            deferred: VecDeque::new(),
            events_tx,
            events: events_rx,
            current: None,
            snapshot: snapshot_tx,
        };
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
        }
    }

    /// Opens a channel for `identity` unless one is already open or
    /// opening for the same user. Any channel for a different user is
    /// closed first.
    ///
    /// Returns once the transport has accepted the connection. The state
    /// is `Connected` as soon as the transport reports it open.
    pub async fn connect(&self, identity: &Identity) -> Result<(), SessionError> {
        self.request_connect(&identity.id)?
            .await
            .map_err(|_| SessionError::ChannelUnavailable)?
    }

    /// Closes the current channel (if any) and clears presence.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request_disconnect()?
            .await
            .map_err(|_| SessionError::ChannelUnavailable)
    }

    /// Closes the current channel and stops the actor. Later calls on any
    /// handle fail with [`SessionError::ChannelUnavailable`].
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(ChannelCommand::Shutdown { reply })?;
        rx.await.map_err(|_| SessionError::ChannelUnavailable)
    }

    /// Enqueues a connect without waiting for it.
    ///
    /// Commands are processed in the order they were enqueued, which is
    /// what lets the coordinator pair them with identity changes.
    pub(crate) fn request_connect(
        &self,
        user_id: &UserId,
    ) -> Result<oneshot::Receiver<Result<(), SessionError>>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(ChannelCommand::Connect {
            user_id: user_id.clone(),
            reply,
        })?;
        Ok(rx)
    }

    /// Enqueues a disconnect without waiting for it.
    pub(crate) fn request_disconnect(
        &self,
    ) -> Result<oneshot::Receiver<()>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(ChannelCommand::Disconnect { reply })?;
        Ok(rx)
    }

    fn send(&self, command: ChannelCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::ChannelUnavailable)
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ChannelSnapshot> {
        self.snapshot.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.snapshot.borrow().state
    }

    pub fn presence(&self) -> PresenceSet {
        self.snapshot.borrow().presence.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.borrow().is_connected()
    }
}

/// The actor itself. Runs inside a Tokio task.
struct ChannelActor<T: RealtimeTransport> {
    transport: T,
    target: Url,
    options: OpenOptions,
    commands: mpsc::UnboundedReceiver<ChannelCommand>,
    /// Commands read while an open was pending, in arrival order.
    deferred: VecDeque<ChannelCommand>,
    /// Cloned into every channel's [`EventSink`].
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events: EventReceiver,
    current: Option<T::Handle>,
    snapshot: watch::Sender<ChannelSnapshot>,
}

impl<T: RealtimeTransport> ChannelActor<T> {
    async fn run(mut self) {
        tracing::debug!(url = %self.target, "channel actor started");

        loop {
            if let Some(cmd) = self.deferred.pop_front() {
                if !self.handle_command(cmd).await {
                    break;
                }
                continue;
            }

            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                // The actor holds a sender, so this queue never closes.
                Some(tagged) = self.events.recv() => self.handle_event(tagged),
            }
        }

        self.close_current().await;
        tracing::debug!("channel actor stopped");
    }

    /// Returns `false` once the actor should stop.
    async fn handle_command(&mut self, cmd: ChannelCommand) -> bool {
        match cmd {
            ChannelCommand::Connect { user_id, reply } => {
                let result = self.handle_connect(user_id).await;
                let _ = reply.send(result);
                true
            }
            ChannelCommand::Disconnect { reply } => {
                self.close_current().await;
                let _ = reply.send(());
                true
            }
            ChannelCommand::Shutdown { reply } => {
                self.close_current().await;
                let _ = reply.send(());
                false
            }
        }
    }

    async fn handle_connect(&mut self, user_id: UserId) -> Result<(), SessionError> {
        if self.snapshot.borrow().is_live_for(&user_id) {
            tracing::debug!(%user_id, "channel already open for user");
            return Ok(());
        }

        self.close_current().await;

        let channel_id = ChannelId::next();
        let sink = EventSink::new(channel_id, self.events_tx.clone());
        self.snapshot.send_replace(ChannelSnapshot {
            state: ChannelState::Connecting,
            user_id: Some(user_id.clone()),
            channel_id: Some(channel_id),
            presence: PresenceSet::empty(),
        });

        let auth = ChannelAuth {
            user_id: user_id.clone(),
        };
        // `None` means a disconnect or shutdown arrived first.
        let opened = {
            let open = self.transport.open(&self.target, &auth, &self.options, sink);
            tokio::pin!(open);
            loop {
                tokio::select! {
                    result = &mut open => break Some(result),
                    cmd = self.commands.recv() => match cmd {
                        Some(cmd @ ChannelCommand::Connect { .. }) => {
                            self.deferred.push_back(cmd);
                        }
                        Some(cmd) => {
                            // Connects queued behind this open are closed
                            // again by `cmd`, so they never get to run.
                            for stale in self.deferred.drain(..) {
                                if let ChannelCommand::Connect { reply, .. } = stale {
                                    let _ = reply.send(Err(SessionError::Superseded));
                                }
                            }
                            self.deferred.push_back(cmd);
                            break None;
                        }
                        None => break None,
                    },
                }
            }
        };

        match opened {
            None => {
                tracing::info!(%user_id, %channel_id, "realtime channel open abandoned");
                self.snapshot.send_replace(ChannelSnapshot::default());
                Err(SessionError::Superseded)
            }
            Some(Ok(handle)) => {
                tracing::info!(%user_id, %channel_id, "realtime channel opening");
                self.current = Some(handle);
                // Apply whatever the transport reported during the handshake
                // so callers see `Connected` right away when it's known.
                while let Ok(tagged) = self.events.try_recv() {
                    self.handle_event(tagged);
                }
                Ok(())
            }
            Some(Err(e)) => {
                tracing::warn!(%user_id, %channel_id, error = %e, "failed to open realtime channel");
                self.snapshot.send_replace(ChannelSnapshot::default());
                Err(e.into())
            }
        }
    }

    fn handle_event(&mut self, tagged: TaggedEvent) {
        let TaggedEvent { channel_id, event } = tagged;
        if self.snapshot.borrow().channel_id != Some(channel_id) {
            tracing::debug!(%channel_id, ?event, "ignoring event from stale channel");
            return;
        }

        match event {
            ChannelEvent::Opened => {
                tracing::info!(%channel_id, "realtime channel connected");
                self.snapshot.send_modify(|s| s.state = ChannelState::Connected);
            }
            ChannelEvent::Closed { reason } => {
                tracing::info!(%channel_id, ?reason, "realtime channel lost");
                self.snapshot.send_modify(|s| {
                    s.state = ChannelState::Disconnected;
                    s.presence = PresenceSet::empty();
                });
            }
            ChannelEvent::RosterUpdated(ids) => {
                let presence: PresenceSet = ids.into_iter().collect();
                tracing::debug!(%channel_id, online = presence.len(), "roster updated");
                self.snapshot.send_modify(|s| s.presence = presence);
            }
        }
    }

    /// Closes and forgets the current channel, resetting to `NoChannel`.
    async fn close_current(&mut self) {
        if let Some(handle) = self.current.take() {
            let channel_id = handle.id();
            if let Err(e) = handle.close().await {
                tracing::warn!(%channel_id, error = %e, "error closing realtime channel");
            }
            tracing::info!(%channel_id, "realtime channel closed");
        }
        self.snapshot.send_if_modified(|s| {
            if *s == ChannelSnapshot::default() {
                return false;
            }
            *s = ChannelSnapshot::default();
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chatline_transport::TransportError;
    use tokio::time::timeout;

    use super::*;

    #[derive(Default)]
    struct MockInner {
        /// Sinks of every channel opened so far, with the user it was for.
        opened: Mutex<Vec<(UserId, EventSink)>>,
        closed: Mutex<Vec<ChannelId>>,
        fail_next: AtomicBool,
        /// Makes the next open wait forever.
        hang_next: AtomicBool,
    }

    /// Opens channels instantly, reporting `Opened` during the handshake.
    #[derive(Clone, Default)]
    struct MockTransport {
        inner: Arc<MockInner>,
    }

    impl MockTransport {
        fn open_count(&self) -> usize {
            self.inner.opened.lock().unwrap().len()
        }

        fn sink(&self, index: usize) -> EventSink {
            self.inner.opened.lock().unwrap()[index].1.clone()
        }
    }

    struct MockHandle {
        id: ChannelId,
        inner: Arc<MockInner>,
    }

    impl RealtimeTransport for MockTransport {
        type Handle = MockHandle;

        async fn open(
            &self,
            _target: &Url,
            auth: &ChannelAuth,
            _options: &OpenOptions,
            events: EventSink,
        ) -> Result<MockHandle, TransportError> {
            if self.inner.fail_next.swap(false, Ordering::SeqCst) {
                return Err(TransportError::Connect("refused".into()));
            }
            if self.inner.hang_next.swap(false, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            events.emit(ChannelEvent::Opened);
            let id = events.channel_id();
            self.inner
                .opened
                .lock()
                .unwrap()
                .push((auth.user_id.clone(), events));
            Ok(MockHandle {
                id,
                inner: Arc::clone(&self.inner),
            })
        }
    }

    impl ChannelHandle for MockHandle {
        async fn close(&self) -> Result<(), TransportError> {
            self.inner.closed.lock().unwrap().push(self.id);
            Ok(())
        }

        fn id(&self) -> ChannelId {
            self.id
        }
    }

    fn spawn_manager() -> (ChannelManager, MockTransport) {
        let transport = MockTransport::default();
        let target = Url::parse("ws://localhost/ws").unwrap();
        let manager =
            ChannelManager::spawn(transport.clone(), target, OpenOptions::default());
        (manager, transport)
    }

    fn ids(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|id| UserId::new(*id)).collect()
    }

    async fn wait_until(
        manager: &ChannelManager,
        check: impl FnMut(&ChannelSnapshot) -> bool,
    ) {
        let mut rx = manager.subscribe();
        timeout(Duration::from_secs(1), rx.wait_for(check))
            .await
            .expect("timed out waiting for channel state")
            .expect("channel actor stopped");
    }

    // =====================================================================
    // connect()
    // =====================================================================

    #[tokio::test]
    async fn test_connect_opens_channel_and_reports_connected() {
        let (manager, transport) = spawn_manager();

        manager.connect(&Identity::new("U1")).await.unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.state, ChannelState::Connected);
        assert_eq!(snapshot.user_id, Some(UserId::new("U1")));
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_same_identity_twice_opens_once() {
        let (manager, transport) = spawn_manager();
        let identity = Identity::new("U1");

        manager.connect(&identity).await.unwrap();
        manager.connect(&identity).await.unwrap();

        assert_eq!(transport.open_count(), 1);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_connect_other_identity_replaces_channel() {
        let (manager, transport) = spawn_manager();

        manager.connect(&Identity::new("U1")).await.unwrap();
        let first = transport.sink(0).channel_id();
        manager.connect(&Identity::new("U2")).await.unwrap();

        assert_eq!(transport.open_count(), 2);
        assert_eq!(*transport.inner.closed.lock().unwrap(), vec![first]);
        assert_eq!(manager.snapshot().user_id, Some(UserId::new("U2")));
    }

    #[tokio::test]
    async fn test_connect_open_failure_returns_error_and_no_channel() {
        let (manager, transport) = spawn_manager();
        transport.inner.fail_next.store(true, Ordering::SeqCst);

        let result = manager.connect(&Identity::new("U1")).await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(manager.snapshot(), ChannelSnapshot::default());
    }

    #[tokio::test]
    async fn test_connect_after_closed_reopens() {
        let (manager, transport) = spawn_manager();
        let identity = Identity::new("U1");
        manager.connect(&identity).await.unwrap();

        transport.sink(0).emit(ChannelEvent::Closed { reason: None });
        wait_until(&manager, |s| s.state == ChannelState::Disconnected).await;
        manager.connect(&identity).await.unwrap();

        assert_eq!(transport.open_count(), 2);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_abandons_pending_open() {
        let (manager, transport) = spawn_manager();
        transport.inner.hang_next.store(true, Ordering::SeqCst);
        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect(&Identity::new("U1")).await }
        });
        wait_until(&manager, |s| s.state == ChannelState::Connecting).await;

        timeout(Duration::from_secs(1), manager.disconnect())
            .await
            .expect("disconnect should not wait for the open")
            .unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SessionError::Superseded)));
        assert_eq!(manager.snapshot(), ChannelSnapshot::default());

        // The actor is free again.
        manager.connect(&Identity::new("U1")).await.unwrap();
        assert!(manager.is_connected());
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_supersedes_connects_queued_behind_pending_open() {
        let (manager, transport) = spawn_manager();
        transport.inner.hang_next.store(true, Ordering::SeqCst);
        let first = manager.request_connect(&UserId::new("U1")).unwrap();
        wait_until(&manager, |s| s.state == ChannelState::Connecting).await;
        let second = manager.request_connect(&UserId::new("U2")).unwrap();

        timeout(Duration::from_secs(1), manager.disconnect())
            .await
            .expect("disconnect should not wait for the open")
            .unwrap();

        assert!(matches!(first.await.unwrap(), Err(SessionError::Superseded)));
        assert!(matches!(second.await.unwrap(), Err(SessionError::Superseded)));
        assert_eq!(manager.state(), ChannelState::NoChannel);
        assert_eq!(transport.open_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_pending_open() {
        let (manager, transport) = spawn_manager();
        transport.inner.hang_next.store(true, Ordering::SeqCst);
        let pending = manager.request_connect(&UserId::new("U1")).unwrap();
        wait_until(&manager, |s| s.state == ChannelState::Connecting).await;

        timeout(Duration::from_secs(1), manager.shutdown())
            .await
            .expect("shutdown should not wait for the open")
            .unwrap();

        assert!(matches!(pending.await.unwrap(), Err(SessionError::Superseded)));
        assert_eq!(manager.state(), ChannelState::NoChannel);
        assert!(transport.inner.closed.lock().unwrap().is_empty());
        let result = manager.connect(&Identity::new("U1")).await;
        assert!(matches!(result, Err(SessionError::ChannelUnavailable)));
    }

    // =====================================================================
    // Events
    // =====================================================================

    #[tokio::test]
    async fn test_roster_update_replaces_presence_wholesale() {
        let (manager, transport) = spawn_manager();
        manager.connect(&Identity::new("U1")).await.unwrap();
        let sink = transport.sink(0);

        sink.emit(ChannelEvent::RosterUpdated(ids(&["U2", "U3"])));
        wait_until(&manager, |s| s.presence.len() == 2).await;
        sink.emit(ChannelEvent::RosterUpdated(ids(&["U3"])));
        wait_until(&manager, |s| s.presence.len() == 1).await;

        let presence = manager.presence();
        assert!(presence.contains(&UserId::new("U3")));
        assert!(!presence.contains(&UserId::new("U2")));
    }

    #[tokio::test]
    async fn test_closed_event_clears_presence() {
        let (manager, transport) = spawn_manager();
        manager.connect(&Identity::new("U1")).await.unwrap();
        let sink = transport.sink(0);
        sink.emit(ChannelEvent::RosterUpdated(ids(&["U2"])));
        wait_until(&manager, |s| !s.presence.is_empty()).await;

        sink.emit(ChannelEvent::Closed {
            reason: Some("server restart".into()),
        });
        wait_until(&manager, |s| s.state == ChannelState::Disconnected).await;

        assert!(manager.presence().is_empty());
        // The channel is kept until an explicit disconnect.
        assert_eq!(manager.snapshot().user_id, Some(UserId::new("U1")));
    }

    #[tokio::test]
    async fn test_events_from_replaced_channel_are_ignored() {
        let (manager, transport) = spawn_manager();
        manager.connect(&Identity::new("U1")).await.unwrap();
        manager.connect(&Identity::new("U2")).await.unwrap();
        let (stale, live) = (transport.sink(0), transport.sink(1));

        stale.emit(ChannelEvent::RosterUpdated(ids(&["X"])));
        stale.emit(ChannelEvent::Closed { reason: None });
        live.emit(ChannelEvent::RosterUpdated(ids(&["U3"])));
        wait_until(&manager, |s| !s.presence.is_empty()).await;

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.state, ChannelState::Connected);
        assert_eq!(snapshot.presence, ids(&["U3"]).into_iter().collect::<PresenceSet>());
    }

    // =====================================================================
    // disconnect() / shutdown()
    // =====================================================================

    #[tokio::test]
    async fn test_disconnect_closes_channel_and_clears_presence() {
        let (manager, transport) = spawn_manager();
        manager.connect(&Identity::new("U1")).await.unwrap();
        transport
            .sink(0)
            .emit(ChannelEvent::RosterUpdated(ids(&["U2"])));
        wait_until(&manager, |s| !s.presence.is_empty()).await;

        manager.disconnect().await.unwrap();

        assert_eq!(manager.snapshot(), ChannelSnapshot::default());
        assert_eq!(transport.inner.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_without_channel_is_noop() {
        let (manager, transport) = spawn_manager();

        manager.disconnect().await.unwrap();

        assert_eq!(manager.state(), ChannelState::NoChannel);
        assert!(transport.inner.closed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel_and_stops_actor() {
        let (manager, transport) = spawn_manager();
        manager.connect(&Identity::new("U1")).await.unwrap();

        manager.shutdown().await.unwrap();

        assert_eq!(transport.inner.closed.lock().unwrap().len(), 1);
        let result = manager.connect(&Identity::new("U1")).await;
        assert!(matches!(result, Err(SessionError::ChannelUnavailable)));
    }

    #[tokio::test]
    async fn test_dropping_all_handles_closes_channel() {
        let (manager, transport) = spawn_manager();
        manager.connect(&Identity::new("U1")).await.unwrap();
        let mut rx = manager.subscribe();

        drop(manager);

        // The actor drops its snapshot sender on exit.
        timeout(Duration::from_secs(1), async {
            while rx.changed().await.is_ok() {}
        })
        .await
        .expect("actor did not stop");
        assert_eq!(transport.inner.closed.lock().unwrap().len(), 1);
    }
}
