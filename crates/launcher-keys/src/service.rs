//! Launcher credential service
//!
//! Issues, toggles and redeems product keys. State lives entirely in the
//! injected repositories; the service itself holds only configuration.

use std::sync::Arc;
use std::time::Duration;

use common::{Secret, now_millis};
use repository::{
    EditionId, EditionRepository, KeyStatus, LauncherCredential, LauncherSession,
    LauncherSessionId, LauncherSessionInfo, LauncherSessionRepository, ProductKeyId,
    ProductKeyRepository,
};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::key::{generate_access_token, generate_product_key, is_valid_product_key};

/// Launcher session lifetime when none is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Most keys a single `generate_keys` call may issue.
pub const MAX_KEYS_PER_REQUEST: usize = 1000;

/// Parse a `status` query value. `revoked` is accepted for `inactive`.
pub fn parse_status(value: &str) -> Result<KeyStatus> {
    match value {
        "active" => Ok(KeyStatus::Active),
        "inactive" | "revoked" => Ok(KeyStatus::Inactive),
        other => Err(Error::InvalidStatus(other.to_string())),
    }
}

pub struct LauncherCredentialService {
    editions: Arc<dyn EditionRepository>,
    keys: Arc<dyn ProductKeyRepository>,
    sessions: Arc<dyn LauncherSessionRepository>,
    session_ttl: Duration,
}

impl LauncherCredentialService {
    pub fn new(
        editions: Arc<dyn EditionRepository>,
        keys: Arc<dyn ProductKeyRepository>,
        sessions: Arc<dyn LauncherSessionRepository>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            editions,
            keys,
            sessions,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Issue `count` new active keys for an edition. `count` must be in
    /// `1..=MAX_KEYS_PER_REQUEST`.
    pub async fn generate_keys(
        &self,
        edition: EditionId,
        count: usize,
    ) -> Result<Vec<LauncherCredential>> {
        if count == 0 || count > MAX_KEYS_PER_REQUEST {
            return Err(Error::InvalidKeyNum);
        }
        if self.editions.get_edition(edition).await?.is_none() {
            return Err(Error::InvalidEdition(edition));
        }

        let created_at = now_millis();
        let keys: Vec<LauncherCredential> = (0..count)
            .map(|_| LauncherCredential {
                id: ProductKeyId::new(),
                key: Secret::new(generate_product_key()),
                status: KeyStatus::Active,
                created_at,
            })
            .collect();

        self.keys.save_product_keys(edition, keys.clone()).await?;
        info!(edition_id = %edition, count, "generated product keys");
        Ok(keys)
    }

    /// All keys of an edition, optionally restricted to one status.
    pub async fn list_keys(
        &self,
        edition: EditionId,
        status: Option<KeyStatus>,
    ) -> Result<Vec<LauncherCredential>> {
        if self.editions.get_edition(edition).await?.is_none() {
            return Err(Error::InvalidEdition(edition));
        }
        let statuses = match status {
            Some(s) => vec![s],
            None => vec![KeyStatus::Active, KeyStatus::Inactive],
        };
        Ok(self.keys.list_product_keys(edition, statuses).await?)
    }

    pub async fn activate(
        &self,
        edition: EditionId,
        id: ProductKeyId,
    ) -> Result<LauncherCredential> {
        self.set_status(edition, id, KeyStatus::Active).await
    }

    pub async fn revoke(&self, edition: EditionId, id: ProductKeyId) -> Result<LauncherCredential> {
        self.set_status(edition, id, KeyStatus::Inactive).await
    }

    /// Toggle a key. Setting the status it already has is a no-op success.
    async fn set_status(
        &self,
        edition: EditionId,
        id: ProductKeyId,
        status: KeyStatus,
    ) -> Result<LauncherCredential> {
        let mut credential = match self.keys.get_product_key(id).await? {
            Some((owner, credential)) if owner == edition => credential,
            _ => return Err(Error::NotFound(format!("product key {id}"))),
        };

        if credential.status == status {
            debug!(product_key_id = %id, ?status, "product key already in requested status");
            return Ok(credential);
        }

        self.keys.update_product_key_status(id, status).await?;
        credential.status = status;
        info!(edition_id = %edition, product_key_id = %id, ?status, "product key status changed");
        Ok(credential)
    }

    /// Exchange an active product key for a new launcher session.
    pub async fn redeem(&self, key: &str) -> Result<LauncherSession> {
        if !is_valid_product_key(key) {
            debug!("rejected malformed product key");
            return Err(Error::InvalidKey);
        }

        let credential = match self.keys.get_product_key_by_value(key).await? {
            Some(c) if c.is_active() => c,
            Some(c) => {
                warn!(product_key_id = %c.id, "redeem attempted with inactive product key");
                return Err(Error::InvalidKey);
            }
            None => return Err(Error::InvalidKey),
        };

        let now = now_millis();
        let ttl_millis = u64::try_from(self.session_ttl.as_millis()).unwrap_or(u64::MAX);
        let session = LauncherSession {
            id: LauncherSessionId::new(),
            access_token: Secret::new(generate_access_token()),
            expires_at: now.saturating_add(ttl_millis.max(1)),
        };

        self.sessions
            .save_launcher_session(credential.id, session.clone())
            .await?;
        info!(
            product_key_id = %credential.id,
            session_id = %session.id,
            expires_at = session.expires_at,
            "launcher session issued"
        );
        Ok(session)
    }

    /// Resolve a bearer token. The credential's current status is not
    /// re-checked.
    pub async fn validate_session(&self, token: &str) -> Result<LauncherSessionInfo> {
        self.validate_session_at(token, now_millis()).await
    }

    pub async fn validate_session_at(
        &self,
        token: &str,
        now_millis: u64,
    ) -> Result<LauncherSessionInfo> {
        let info = self
            .sessions
            .get_launcher_session(token)
            .await?
            .ok_or(Error::InvalidToken)?;

        if info.session.is_expired_at(now_millis) {
            return Err(Error::Expired);
        }
        Ok(info)
    }
}
