//! Client-held session cookie
//!
//! The whole session is one typed struct, serialized to JSON, base64url
//! encoded and stored in a single signed cookie. The server keeps no session
//! table; tampering is caught by the signature.

use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use collection_auth::{AuthorizationState, IdentitySession, UserIdentity};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MIN_SECRET_LEN;
use crate::error::ApiError;

/// Everything the gateway keeps about a browser between requests.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentitySession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserIdentity>,
    /// Present only between login start and callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_state: Option<AuthorizationState>,
}

#[derive(Clone)]
pub struct SessionStore {
    key: Key,
    cookie_name: String,
    max_age: time::Duration,
    secure: bool,
}

impl SessionStore {
    pub fn new(
        secret: &[u8],
        cookie_name: impl Into<String>,
        max_age_secs: u64,
        secure: bool,
    ) -> common::Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(common::Error::Config(format!(
                "session secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(Self {
            key: Key::derive_from(secret),
            cookie_name: cookie_name.into(),
            max_age: time::Duration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX)),
            secure,
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The stored session, if the cookie is present and verifies.
    pub fn get(&self, jar: &SignedCookieJar) -> Option<ClientSession> {
        let cookie = jar.get(&self.cookie_name)?;
        match decode(cookie.value()) {
            Some(session) => Some(session),
            None => {
                debug!("discarding undecodable session cookie");
                None
            }
        }
    }

    /// The stored session, or a fresh empty one.
    pub fn get_or_create(&self, jar: &SignedCookieJar) -> ClientSession {
        self.get(jar).unwrap_or_default()
    }

    /// Write the session into the jar. Last write wins.
    pub fn save(
        &self,
        jar: SignedCookieJar,
        session: &ClientSession,
    ) -> Result<SignedCookieJar, ApiError> {
        let json = serde_json::to_vec(session)
            .map_err(|e| ApiError::Internal(format!("serializing session: {e}")))?;
        let cookie = Cookie::build((self.cookie_name.clone(), URL_SAFE_NO_PAD.encode(json)))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(self.max_age);
        Ok(jar.add(cookie))
    }

    /// Expire the cookie immediately.
    pub fn revoke(&self, jar: SignedCookieJar) -> SignedCookieJar {
        jar.remove(Cookie::build(self.cookie_name.clone()).path("/"))
    }
}

fn decode(value: &str) -> Option<ClientSession> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}
