//! Browser login state machine
//!
//! `Unauthenticated -> AwaitingCallback -> Authenticated -> (Expired | LoggedOut)`
//!
//! The flow itself is stateless. Every step takes what the client session
//! currently holds and returns what should be written back; the gateway owns
//! the cookie.

use std::sync::Arc;

use common::Secret;
use tracing::{debug, info, warn};

use crate::constants::EXPIRY_MARGIN_MILLIS;
use crate::error::{Error, Result};
use crate::pkce::{self, CodeChallengeMethod};
use crate::provider::{IdentityProvider, ProviderConfig};
use crate::session::{AuthorizationState, IdentitySession, UserIdentity};

/// Outcome of a successful callback, to be stored in the client session.
#[derive(Debug, Clone)]
pub struct Login {
    pub session: IdentitySession,
    pub user: UserIdentity,
}

/// Result of checking a stored identity session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    Valid,
    Expired,
    NoSession,
}

/// Check a stored identity session against the clock.
///
/// Never contacts the identity provider.
pub fn authenticate(session: Option<&IdentitySession>, now_millis: u64) -> Authentication {
    match session {
        None => Authentication::NoSession,
        Some(s) if s.is_expired_at(now_millis) => Authentication::Expired,
        Some(_) => Authentication::Valid,
    }
}

pub struct LoginFlow {
    config: ProviderConfig,
    provider: Arc<dyn IdentityProvider>,
}

impl LoginFlow {
    pub fn new(config: ProviderConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { config, provider }
    }

    /// Start a login: returns the authorize URL to redirect to and the
    /// state to keep in the client session.
    pub fn begin(&self) -> Result<(String, AuthorizationState)> {
        let method = CodeChallengeMethod::S256;
        let verifier = pkce::generate_verifier();
        let challenge = pkce::derive_challenge(&verifier, method);
        let state = pkce::generate_state();

        let url = pkce::build_authorization_url(
            &self.config.base_url,
            &self.config.client_id,
            &challenge,
            method,
            &state,
        )?;

        debug!("login started");
        Ok((
            url,
            AuthorizationState {
                method,
                verifier: Secret::new(verifier),
                state,
            },
        ))
    }

    /// Complete a login from the provider redirect.
    ///
    /// `stored` is whatever `begin` left in the client session. On success the
    /// caller replaces any previous identity and drops `stored`.
    pub async fn callback(
        &self,
        stored: Option<&AuthorizationState>,
        code: &str,
        state: Option<&str>,
        now_millis: u64,
    ) -> Result<Login> {
        let stored = stored.ok_or(Error::NoAuthorizationState)?;
        if state != Some(stored.state.as_str()) {
            warn!("callback state does not match stored state");
            return Err(Error::StateMismatch);
        }

        let token = self
            .provider
            .exchange_code(code, stored.verifier.as_str())
            .await?;

        let user = self.provider.fetch_me(&token.access_token).await?;

        let expires_at = now_millis
            .saturating_add(token.expires_in.saturating_mul(1_000))
            .saturating_sub(EXPIRY_MARGIN_MILLIS);

        info!(user_id = %user.id, user = %user.name, expires_at, "login completed");

        Ok(Login {
            session: IdentitySession {
                access_token: Secret::new(token.access_token),
                expires_at,
                refresh_token: token.refresh_token.map(Secret::new),
            },
            user,
        })
    }

    /// Revoke the upstream token. On error the caller must keep the local
    /// session so the logout can be retried.
    pub async fn logout(&self, session: Option<&IdentitySession>) -> Result<()> {
        let session = session.ok_or(Error::NoSession)?;
        self.provider.revoke(session.access_token.as_str()).await?;
        info!("identity session revoked");
        Ok(())
    }
}
