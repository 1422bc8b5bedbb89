//! Session lifecycle management for Chatline.
//!
//! This crate keeps three things consistent for a single logged-in user:
//!
//! 1. **Credential** — the bearer token, persisted across restarts
//!    ([`CredentialStore`] over a [`KeyValueStore`])
//! 2. **Identity** — who the token belongs to ([`IdentityResolver`])
//! 3. **Channel** — the realtime connection and the online-user roster it
//!    reports ([`ChannelManager`])
//!
//! [`SessionCoordinator`] is the only thing that changes them, through
//! four operations: resume, login, logout and profile update. Outcomes are
//! reported to the user through a [`Notifier`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← calls login/logout, reads identity and presence
//!     ↕
//! Session Layer (this crate)  ← owns credential, identity and channel state
//!     ↕
//! Transport Layer (below)  ← HTTP requests, realtime channel events
//! ```

mod channel;
mod config;
mod coordinator;
mod error;
mod notify;
mod resolver;
mod store;

pub use channel::{ChannelManager, ChannelSnapshot, ChannelState};
pub use config::SessionConfig;
pub use coordinator::SessionCoordinator;
pub use error::SessionError;
pub use notify::{Notifier, TracingNotifier};
pub use resolver::{Authenticated, IdentityResolver};
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore};
