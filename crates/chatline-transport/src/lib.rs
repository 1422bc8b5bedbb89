//! Transport abstraction layer for Chatline.
//!
//! The session layer talks to the outside world through two narrow traits:
//!
//! - [`HttpApi`] — one JSON request/response round trip against the auth
//!   API, with the bearer credential passed explicitly on every call.
//! - [`RealtimeTransport`] / [`ChannelHandle`] — open and close the
//!   persistent realtime connection. Everything the connection reports
//!   (opened, closed, roster updates) is pushed into an [`EventSink`].
//!
//! # Feature Flags
//!
//! - `http` (default) — [`ReqwestApi`], the auth API client via `reqwest`
//! - `websocket` (default) — [`WebSocketTransport`] via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod event;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use event::{ChannelEvent, EventReceiver, EventSink, TaggedEvent, event_queue};
#[cfg(feature = "http")]
pub use http::{CookieJar, ReqwestApi};
pub use url::Url;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketChannel, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chatline_protocol::{ApiResponse, Credential, ROSTER_EVENT, UserId};
use serde::Serialize;

/// How long a realtime handshake may take unless configured otherwise.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Counter for generating unique channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for one realtime channel.
///
/// Every call to [`RealtimeTransport::open`] gets a fresh id, so events
/// from a channel that has since been replaced can be told apart from
/// events of the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Creates a new `ChannelId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HTTP capability
// ---------------------------------------------------------------------------

/// HTTP verbs used by the auth API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
            Self::Put => f.write_str("PUT"),
        }
    }
}

/// Performs JSON requests against the auth API.
///
/// The credential is an explicit argument rather than client state: the
/// session coordinator decides, per call, which token (if any) is sent.
///
/// The returned future must be `Send` because the session coordinator is
/// shared across tasks.
pub trait HttpApi: Send + Sync + 'static {
    /// Sends one request and returns the decoded response envelope.
    ///
    /// A backend rejection is `Ok` with `success: false`; only a failed
    /// round trip is an `Err`.
    fn request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        credential: Option<&Credential>,
        body: Option<&B>,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send
    where
        B: Serialize + Sync + ?Sized;
}

// ---------------------------------------------------------------------------
// Realtime capability
// ---------------------------------------------------------------------------

/// Who a realtime channel is opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAuth {
    pub user_id: UserId,
}

/// Per-open options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Attach stored cookies for the backend to the connection request.
    pub with_credentials: bool,
    /// Name of the event that carries the online-user roster.
    pub roster_event: String,
    /// Give up on the handshake after this long.
    pub connect_timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            with_credentials: true,
            roster_event: ROSTER_EVENT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Opens realtime channels.
pub trait RealtimeTransport: Send + Sync + 'static {
    /// The handle type produced by this transport.
    type Handle: ChannelHandle;

    /// Opens a channel to `target` for the given user.
    ///
    /// On success the transport must already have emitted
    /// [`ChannelEvent::Opened`] into `events` (or will emit it once the
    /// connection is up), and keeps emitting events for this channel
    /// until it is closed.
    fn open(
        &self,
        target: &Url,
        auth: &ChannelAuth,
        options: &OpenOptions,
        events: EventSink,
    ) -> impl Future<Output = Result<Self::Handle, TransportError>> + Send;
}

/// A single open realtime channel.
pub trait ChannelHandle: Send + Sync + 'static {
    /// Closes the channel. Events emitted after this call are stale.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the id this channel was opened with.
    fn id(&self) -> ChannelId;
}
