//! Identity provider client
//!
//! Three interactions with the provider, all under `{base_url}`:
//! 1. Code exchange (`POST /oauth2/token`, form encoded)
//! 2. User info (`GET /users/me`, bearer)
//! 3. Revocation (`POST /oauth2/revoke`, form encoded)
//!
//! The HTTP client carries a timeout; a timed-out call is an error, never
//! retried here.

use std::time::Duration;

use repository::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{DEFAULT_TIMEOUT_SECS, REVOKE_PATH, TOKEN_PATH, USER_INFO_PATH};
use crate::error::{Error, Result};
use crate::session::UserIdentity;

/// Immutable provider settings, injected at construction.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub client_id: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token_type: String,
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// The upstream identity provider, as seen by the login flow.
pub trait IdentityProvider: Send + Sync {
    /// Exchange an authorization code plus PKCE verifier for a token.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, Result<TokenResponse>>;

    /// Resolve the identity behind an access token.
    fn fetch_me<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<UserIdentity>>;

    /// Revoke an access token.
    fn revoke<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// HTTP client for a traQ-compatible OAuth2 provider.
pub struct TraqProvider {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl TraqProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl IdentityProvider for TraqProvider {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, Result<TokenResponse>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint(TOKEN_PATH))
                .form(&[
                    ("grant_type", "authorization_code"),
                    ("client_id", self.client_id.as_str()),
                    ("code", code),
                    ("code_verifier", verifier),
                ])
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = body_text(response).await;
                return Err(match status.as_u16() {
                    400 => Error::InvalidStateOrCode,
                    401 => Error::InvalidClient(body),
                    code => Error::Upstream { status: code, body },
                });
            }

            let token = response
                .json::<TokenResponse>()
                .await
                .map_err(|e| Error::InvalidResponse(format!("token response: {e}")))?;
            debug!(expires_in = token.expires_in, "exchanged authorization code");
            Ok(token)
        })
    }

    fn fetch_me<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<UserIdentity>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.endpoint(USER_INFO_PATH))
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status.as_u16() == 401 {
                return Err(Error::InvalidSession);
            }
            if !status.is_success() {
                let body = body_text(response).await;
                return Err(Error::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<UserIdentity>()
                .await
                .map_err(|e| Error::InvalidResponse(format!("user info: {e}")))
        })
    }

    fn revoke<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint(REVOKE_PATH))
                .form(&[("token", access_token)])
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = body_text(response).await;
                warn!(status = status.as_u16(), "token revocation rejected");
                return Err(Error::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(())
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

async fn body_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"))
}
