//! Auth API client using `reqwest`.

use std::sync::Arc;

use chatline_protocol::{ApiResponse, Codec, Credential, JsonCodec};
use serde::Serialize;

use crate::{HttpApi, HttpMethod, TransportError, Url};

/// Cookie jar shared between the HTTP client and the realtime transport,
/// so cookies set by the auth API ride along on the WebSocket upgrade.
pub type CookieJar = reqwest::cookie::Jar;

/// An [`HttpApi`] backed by a `reqwest::Client` and a fixed base URL.
///
/// Request paths are absolute (`/api/auth/check`) and replace whatever
/// path the base URL has.
#[derive(Debug, Clone)]
pub struct ReqwestApi {
    base: Url,
    client: reqwest::Client,
    codec: JsonCodec,
}

impl ReqwestApi {
    /// Creates a client without a cookie store.
    pub fn new(base: Url) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            base,
            client,
            codec: JsonCodec,
        })
    }

    /// Creates a client that stores and sends cookies through `jar`.
    pub fn with_cookies(
        base: Url,
        jar: Arc<CookieJar>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            base,
            client,
            codec: JsonCodec,
        })
    }

    /// The base URL every request path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

impl HttpApi for ReqwestApi {
    async fn request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        credential: Option<&Credential>,
        body: Option<&B>,
    ) -> Result<ApiResponse, TransportError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let mut builder = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
        };
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.expose());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        // Error statuses usually still carry `{ success: false, message }`,
        // and that message is what the user should see.
        match self.codec.decode::<ApiResponse>(&bytes) {
            Ok(body) => {
                tracing::debug!(
                    %method,
                    path,
                    status = status.as_u16(),
                    success = body.success,
                    "auth api response"
                );
                Ok(body)
            }
            Err(e) if status.is_success() => {
                Err(TransportError::InvalidResponse(e))
            }
            Err(_) => Err(TransportError::Status {
                status: status.as_u16(),
            }),
        }
    }
}
