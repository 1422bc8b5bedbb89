//! # Chatline
//!
//! Client-side session management for a chat application.
//!
//! Chatline keeps one user's session consistent: the bearer credential
//! persisted on disk, the identity it resolves to, and the realtime
//! channel that reports which other users are online. Applications call
//! four operations (resume, login, logout, update profile) and read the
//! rest as observable state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatline::prelude::*;
//!
//! # async fn run() -> Result<(), ChatlineError> {
//! chatline::init_tracing();
//!
//! let client = ChatlineClient::builder()
//!     .config(ClientConfig::from_env())
//!     .build()?;
//!
//! if client.resume_session().await?.is_none() {
//!     client
//!         .login(AuthMode::Login, &AuthRequest::login("ada@example.com", "secret"))
//!         .await?;
//! }
//! println!("online: {}", client.presence().len());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::{ChatlineClient, ChatlineClientBuilder, ClientSession};
pub use config::{ClientConfig, default_storage_dir};
pub use error::ChatlineError;

pub use chatline_protocol as protocol;
pub use chatline_session as session;
pub use chatline_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that honours `RUST_LOG`, defaulting to
/// `info`. Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    pub use crate::{ChatlineClient, ChatlineClientBuilder, ChatlineError, ClientConfig};
    pub use chatline_protocol::{
        AuthMode, AuthRequest, Credential, Identity, PresenceSet, ProfileUpdate, UserId,
    };
    pub use chatline_session::{
        ChannelSnapshot, ChannelState, Notifier, SessionConfig, SessionError, TracingNotifier,
    };
}
