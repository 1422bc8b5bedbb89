//! Identity resolution: turning credentials into a verified [`Identity`].
//!
//! This is the only part of the session layer that knows the auth API's
//! endpoints. It doesn't store anything. The coordinator decides what to
//! keep from each answer.

use chatline_protocol::{
    ApiResponse, AuthMode, AuthRequest, Credential, Identity, ProfileUpdate,
    ProtocolError,
};
use chatline_transport::{HttpApi, HttpMethod};

use crate::SessionError;

const CHECK_PATH: &str = "/api/auth/check";
const UPDATE_PROFILE_PATH: &str = "/api/auth/update-profile";

/// The result of a successful signup or login.
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated {
    pub identity: Identity,
    pub credential: Credential,
    /// The backend's success message, if it sent one.
    pub message: Option<String>,
}

/// Exchanges credentials for identities through an [`HttpApi`].
#[derive(Debug, Clone)]
pub struct IdentityResolver<H> {
    api: H,
}

impl<H: HttpApi> IdentityResolver<H> {
    pub fn new(api: H) -> Self {
        Self { api }
    }

    /// Checks that `credential` is still valid and returns who it belongs to.
    ///
    /// # Errors
    /// - [`SessionError::AuthRejected`] — invalid or expired credential
    /// - [`SessionError::Transport`] — the request didn't complete
    /// - [`SessionError::Protocol`] — success without a user
    pub async fn verify(
        &self,
        credential: &Credential,
    ) -> Result<Identity, SessionError> {
        let response = self
            .api
            .request(HttpMethod::Get, CHECK_PATH, Some(credential), None::<&()>)
            .await?;
        accepted(response, "session check failed")?
            .into_identity()
            .ok_or_else(|| missing("user"))
    }

    /// Signs up or logs in, returning the new identity and its credential.
    ///
    /// # Errors
    /// - [`SessionError::AuthRejected`] — bad credentials, duplicate account
    /// - [`SessionError::Transport`] — the request didn't complete
    /// - [`SessionError::Protocol`] — success without a user or token
    pub async fn authenticate(
        &self,
        mode: AuthMode,
        request: &AuthRequest,
    ) -> Result<Authenticated, SessionError> {
        let fallback = format!("{} failed", mode.as_str().to_lowercase());
        let response = self
            .api
            .request(HttpMethod::Post, &mode.endpoint(), None, Some(request))
            .await?;
        let mut response = accepted(response, &fallback)?;

        let credential = response
            .token
            .take()
            .map(Credential::new)
            .filter(|c| !c.is_blank())
            .ok_or_else(|| missing("token"))?;
        let message = response.message.take();
        let identity = response.into_identity().ok_or_else(|| missing("userData"))?;

        Ok(Authenticated {
            identity,
            credential,
            message,
        })
    }

    /// Applies `update` to the profile `credential` belongs to.
    ///
    /// # Errors
    /// - [`SessionError::AuthRejected`] — the backend refused the update
    /// - [`SessionError::Transport`] — the request didn't complete
    /// - [`SessionError::Protocol`] — success without the updated user
    pub async fn update_profile(
        &self,
        credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<Identity, SessionError> {
        let response = self
            .api
            .request(
                HttpMethod::Put,
                UPDATE_PROFILE_PATH,
                Some(credential),
                Some(update),
            )
            .await?;
        accepted(response, "profile update failed")?
            .into_identity()
            .ok_or_else(|| missing("user"))
    }
}

/// Passes successful responses through; turns `success: false` into
/// `AuthRejected` with the backend's message (or `fallback`).
fn accepted(
    response: ApiResponse,
    fallback: &str,
) -> Result<ApiResponse, SessionError> {
    if response.success {
        return Ok(response);
    }
    let message = response
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    Err(SessionError::AuthRejected(message))
}

fn missing(field: &str) -> SessionError {
    SessionError::Protocol(ProtocolError::InvalidMessage(format!(
        "successful response without {field}"
    )))
}
