//! Wire protocol for Chatline.
//!
//! This crate defines what the session layer and the backend exchange:
//!
//! - **Types** ([`Identity`], [`Credential`], [`ApiResponse`],
//!   [`RealtimeFrame`], etc.) — auth API bodies and realtime frames.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! It knows nothing about sockets, HTTP clients, or session state.
//!
//! ```text
//! Transport (bytes) → Protocol (typed messages) → Session (lifecycle)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ApiResponse, AuthMode, AuthRequest, Credential, FrameHeader, Identity,
    PresenceSet, ProfileUpdate, ROSTER_EVENT, RealtimeFrame, RosterFrame,
    UserId,
};
