//! Values the login flow keeps in the client-held session

use common::Secret;
use repository::UserId;
use serde::{Deserialize, Serialize};

use crate::pkce::CodeChallengeMethod;

/// PKCE material between `begin` and `callback`. Consumed by the first
/// successful callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    pub method: CodeChallengeMethod,
    pub verifier: Secret<String>,
    pub state: String,
}

/// A validated upstream identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySession {
    pub access_token: Secret<String>,
    /// Unix millis. The session is usable strictly before this instant.
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret<String>>,
}

impl IdentitySession {
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at
    }
}

/// The caller as reported by the provider's user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
}
