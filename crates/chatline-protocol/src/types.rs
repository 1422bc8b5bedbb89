//! Core protocol types for the Chatline auth API and realtime channel.
//!
//! Everything in this module either travels "on the wire" (request and
//! response bodies, realtime frames) or is the in-memory form of something
//! that does (the bearer [`Credential`]).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The backend's unique identifier for a user.
///
/// A newtype over `String` so a user id can't be confused with a token,
/// an email address, or any other string floating around the session layer.
///
/// `#[serde(transparent)]` keeps the JSON form a plain string: the backend
/// sends `"_id": "65f0…"`, not `"_id": { "0": "65f0…" }`.
///
/// `Ord` is derived so ids can live in a `BTreeSet` (see [`PresenceSet`]),
/// which gives a stable iteration order for logs and UIs.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a `UserId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An opaque bearer token proving an authenticated identity.
///
/// The session layer never looks inside it: it stores it, loads it, and
/// hands it to the HTTP client, which sends it as
/// `Authorization: Bearer <token>`.
///
/// `Debug` is implemented by hand so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token, e.g. for building an auth header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the token is empty or whitespace-only.
    ///
    /// A blank token can't authenticate anything, so the credential store
    /// treats one as "no credential".
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The authenticated user's profile, as returned by the backend.
///
/// Only `id` is structurally required. The well-known profile fields are
/// optional because different endpoints return different subsets, and any
/// field this crate doesn't know about is kept in `extra` so that a
/// profile can be handed back to a UI without losing data.
///
/// `#[serde(rename_all = "camelCase")]` matches the backend's JSON
/// (`fullName`, `profilePic`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Unique user id. The backend calls this `_id`.
    #[serde(rename = "_id")]
    pub id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    /// Any additional fields the backend sent (timestamps, counters, …).
    #[cfg(feature = "json")]
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Identity {
    /// Creates an identity with only an id set.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            full_name: None,
            email: None,
            profile_pic: None,
            bio: None,
            #[cfg(feature = "json")]
            extra: serde_json::Map::new(),
        }
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// The set of peers the realtime channel currently reports as online.
///
/// Always replaced wholesale — there is deliberately no `insert` or
/// `remove`. A roster update from the server is the complete truth, so the
/// only way to change a `PresenceSet` is to build a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet(BTreeSet<UserId>);

impl PresenceSet {
    /// Returns an empty presence set.
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns `true` if the given user is currently online.
    pub fn contains(&self, id: &UserId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the online user ids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }
}

/// Builds a presence set from a roster. Duplicate ids collapse.
impl FromIterator<UserId> for PresenceSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Auth requests
// ---------------------------------------------------------------------------

/// Which authentication endpoint to call.
///
/// The endpoint path is the mode's name lower-cased:
/// `SignUp` → `/api/auth/signup`, `Login` → `/api/auth/login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    /// Create a new account and log into it.
    SignUp,
    /// Log into an existing account.
    Login,
}

impl AuthMode {
    /// The mode's canonical name (`"SignUp"` / `"Login"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignUp => "SignUp",
            Self::Login => "Login",
        }
    }

    /// The request path for this mode.
    pub fn endpoint(&self) -> String {
        format!("/api/auth/{}", self.as_str().to_lowercase())
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a signup or login request.
///
/// Signup additionally uses `full_name` and `bio`; login ignores them.
/// `None` fields are left out of the JSON entirely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl AuthRequest {
    /// Credentials for a plain login.
    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: None,
            bio: None,
        }
    }

    /// Credentials plus the profile fields a new account starts with.
    pub fn sign_up(
        email: impl Into<String>,
        password: impl Into<String>,
        full_name: impl Into<String>,
        bio: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: Some(full_name.into()),
            bio: Some(bio.into()),
        }
    }
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("bio", &self.bio)
            .finish()
    }
}

/// Fields to change on the current user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// New profile picture, typically a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl ProfileUpdate {
    /// Returns `true` if no field would change.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.bio.is_none() && self.profile_pic.is_none()
    }
}

// ---------------------------------------------------------------------------
// ApiResponse — the auth API's response envelope
// ---------------------------------------------------------------------------

/// The JSON envelope every auth endpoint responds with.
///
/// ```text
/// { "success": true,  "user": {...}, "token": "...", "message": "..." }
/// { "success": false, "message": "Invalid credentials" }
/// ```
///
/// Signup/login return the profile as `userData`; the check and update
/// endpoints call it `user`. [`into_identity`](Self::into_identity) hides
/// the difference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Identity>,
}

impl ApiResponse {
    /// A `success: false` response carrying the given message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Takes the returned profile, preferring `userData` over `user`.
    pub fn into_identity(self) -> Option<Identity> {
        self.user_data.or(self.user)
    }
}

// ---------------------------------------------------------------------------
// Realtime frames
// ---------------------------------------------------------------------------

/// Name of the event the server uses to push the online-user roster.
pub const ROSTER_EVENT: &str = "getOnlineUsers";

/// Just the event name of an incoming realtime frame.
///
/// Frames are decoded in two steps: first the header, to find out which
/// event this is, then the full [`RealtimeFrame`] with the right payload
/// type. Unknown fields (including `data`) are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrameHeader {
    pub event: String,
}

/// A realtime frame: `{ "event": "<name>", "data": <payload> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeFrame<T> {
    pub event: String,
    pub data: T,
}

/// The roster payload: every user id the server considers online.
pub type RosterFrame = RealtimeFrame<Vec<UserId>>;

// =========================================================================
// Tests
// =========================================================================
