//! JSON file store
//!
//! Keeps the whole collection state (editions, games, roles, product keys,
//! launcher sessions) in one JSON document. All writes use atomic temp-file
//! + rename. A tokio Mutex serializes writers; readers hold it only long
//! enough to clone what they need.
//!
//! Mutations are applied to a copy of the state. The copy becomes live only
//! after it has been written, so a failed or cancelled write leaves memory
//! matching the last persisted document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{
    Edition, EditionId, Game, GameId, GameRole, KeyStatus, LauncherCredential, LauncherSession,
    LauncherSessionId, LauncherSessionInfo, ProductKeyId, UserId, Visibility,
};
use crate::{
    BoxFuture, EditionRepository, GameRepository, LauncherSessionRepository,
    ProductKeyRepository, RoleRepository,
};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    admins: Vec<UserId>,
    #[serde(default)]
    editions: HashMap<EditionId, Edition>,
    #[serde(default)]
    games: HashMap<GameId, Game>,
    #[serde(default)]
    game_roles: HashMap<GameId, HashMap<UserId, GameRole>>,
    #[serde(default)]
    product_keys: HashMap<ProductKeyId, StoredProductKey>,
    #[serde(default)]
    launcher_sessions: HashMap<LauncherSessionId, StoredLauncherSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredProductKey {
    edition_id: EditionId,
    #[serde(flatten)]
    credential: LauncherCredential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredLauncherSession {
    product_key_id: ProductKeyId,
    #[serde(flatten)]
    session: LauncherSession,
}

/// Thread-safe JSON store implementing every repository trait.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreData>,
}

impl FileStore {
    /// Load the store from the given file path.
    ///
    /// If the file doesn't exist, creates it as an empty document. Editions,
    /// games and roles are provisioned by operators editing the file (or via
    /// the `insert_*` helpers); the gateway only writes keys and sessions.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading store file: {e}")))?;
            let data: StoreData = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing store file: {e}")))?;
            info!(
                path = %path.display(),
                editions = data.editions.len(),
                games = data.games.len(),
                product_keys = data.product_keys.len(),
                "loaded store"
            );
            data
        } else {
            info!(path = %path.display(), "store file not found, starting empty");
            let data = StoreData::default();
            write_atomic(&path, &data).await?;
            data
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Apply `change` to a copy of the state, persist the copy, then make it
    /// live. Nothing changes in memory unless the write succeeds.
    async fn commit<T>(&self, change: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = change(&mut next)?;
        write_atomic(&self.path, &next).await?;
        *state = next;
        Ok(out)
    }

    /// Add or replace an edition and persist.
    pub async fn insert_edition(&self, edition: Edition) -> Result<()> {
        debug!(edition_id = %edition.id, "inserting edition");
        self.commit(|state| {
            state.editions.insert(edition.id, edition);
            Ok(())
        })
        .await
    }

    /// Add or replace a game and persist.
    pub async fn insert_game(&self, game: Game) -> Result<()> {
        debug!(game_id = %game.id, "inserting game");
        self.commit(|state| {
            state.games.insert(game.id, game);
            Ok(())
        })
        .await
    }

    /// Mark a user as collection administrator and persist.
    pub async fn grant_admin(&self, user: UserId) -> Result<()> {
        self.commit(|state| {
            if !state.admins.contains(&user) {
                state.admins.push(user);
            }
            Ok(())
        })
        .await
    }

    /// Set a user's role on a game and persist.
    pub async fn set_game_role(&self, game: GameId, user: UserId, role: GameRole) -> Result<()> {
        self.commit(|state| {
            state.game_roles.entry(game).or_default().insert(user, role);
            Ok(())
        })
        .await
    }

    /// Number of stored launcher sessions (expired ones included).
    pub async fn launcher_session_count(&self) -> usize {
        let state = self.state.lock().await;
        state.launcher_sessions.len()
    }
}

impl EditionRepository for FileStore {
    fn get_edition(&self, id: EditionId) -> BoxFuture<'_, Result<Option<Edition>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.editions.get(&id).cloned())
        })
    }
}

impl GameRepository for FileStore {
    fn get_game(&self, id: GameId) -> BoxFuture<'_, Result<Option<Game>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.games.get(&id).cloned())
        })
    }

    fn update_visibility(
        &self,
        id: GameId,
        visibility: Visibility,
    ) -> BoxFuture<'_, Result<Game>> {
        Box::pin(async move {
            let updated = self
                .commit(|state| {
                    let game = state
                        .games
                        .get_mut(&id)
                        .ok_or_else(|| Error::NotFound(format!("game {id}")))?;
                    game.visibility = visibility;
                    Ok(game.clone())
                })
                .await?;
            debug!(game_id = %id, visibility = visibility.label(), "updated visibility");
            Ok(updated)
        })
    }
}

impl RoleRepository for FileStore {
    fn is_admin(&self, user: UserId) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.admins.contains(&user))
        })
    }

    fn game_role(&self, game: GameId, user: UserId) -> BoxFuture<'_, Result<Option<GameRole>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .game_roles
                .get(&game)
                .and_then(|roles| roles.get(&user))
                .copied())
        })
    }

    fn game_managers(&self, game: GameId) -> BoxFuture<'_, Result<Vec<(UserId, GameRole)>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut managers: Vec<(UserId, GameRole)> = state
                .game_roles
                .get(&game)
                .map(|roles| roles.iter().map(|(u, r)| (*u, *r)).collect())
                .unwrap_or_default();
            managers.sort_by_key(|(user, _)| *user);
            Ok(managers)
        })
    }

    fn edition_access(&self, edition: EditionId, user: UserId) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .editions
                .get(&edition)
                .is_some_and(|e| e.managers.contains(&user)))
        })
    }
}

impl ProductKeyRepository for FileStore {
    fn save_product_keys(
        &self,
        edition: EditionId,
        keys: Vec<LauncherCredential>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let count = keys.len();
            self.commit(|state| {
                for credential in keys {
                    state.product_keys.insert(
                        credential.id,
                        StoredProductKey {
                            edition_id: edition,
                            credential,
                        },
                    );
                }
                Ok(())
            })
            .await?;
            debug!(edition_id = %edition, count, "saved product keys");
            Ok(())
        })
    }

    fn list_product_keys(
        &self,
        edition: EditionId,
        statuses: Vec<KeyStatus>,
    ) -> BoxFuture<'_, Result<Vec<LauncherCredential>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut keys: Vec<LauncherCredential> = state
                .product_keys
                .values()
                .filter(|k| k.edition_id == edition && statuses.contains(&k.credential.status))
                .map(|k| k.credential.clone())
                .collect();
            keys.sort_by_key(|k| (k.created_at, k.id));
            Ok(keys)
        })
    }

    fn get_product_key(
        &self,
        id: ProductKeyId,
    ) -> BoxFuture<'_, Result<Option<(EditionId, LauncherCredential)>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .product_keys
                .get(&id)
                .map(|k| (k.edition_id, k.credential.clone())))
        })
    }

    fn get_product_key_by_value<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<LauncherCredential>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .product_keys
                .values()
                .find(|k| k.credential.key.as_str() == key)
                .map(|k| k.credential.clone()))
        })
    }

    fn update_product_key_status(
        &self,
        id: ProductKeyId,
        status: KeyStatus,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.commit(|state| {
                let stored = state
                    .product_keys
                    .get_mut(&id)
                    .ok_or_else(|| Error::NotFound(format!("product key {id}")))?;
                stored.credential.status = status;
                Ok(())
            })
            .await?;
            debug!(product_key_id = %id, ?status, "updated product key status");
            Ok(())
        })
    }
}

impl LauncherSessionRepository for FileStore {
    fn save_launcher_session(
        &self,
        product_key: ProductKeyId,
        session: LauncherSession,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let session_id = session.id;
            self.commit(|state| {
                state.launcher_sessions.insert(
                    session.id,
                    StoredLauncherSession {
                        product_key_id: product_key,
                        session,
                    },
                );
                Ok(())
            })
            .await?;
            debug!(
                product_key_id = %product_key,
                session_id = %session_id,
                "saved launcher session"
            );
            Ok(())
        })
    }

    fn get_launcher_session<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Option<LauncherSessionInfo>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let Some(stored) = state
                .launcher_sessions
                .values()
                .find(|s| s.session.access_token.as_str() == access_token)
            else {
                return Ok(None);
            };

            // A session whose key or edition has vanished is treated as unknown
            let Some(key) = state.product_keys.get(&stored.product_key_id) else {
                return Ok(None);
            };
            let Some(edition) = state.editions.get(&key.edition_id) else {
                return Ok(None);
            };

            Ok(Some(LauncherSessionInfo {
                session: stored.session.clone(),
                credential: key.credential.clone(),
                edition: edition.clone(),
            }))
        })
    }

    fn delete_expired_launcher_sessions(&self, now_millis: u64) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut next = state.clone();
            next.launcher_sessions.retain(|_, s| !s.session.is_expired_at(now_millis));
            let removed = state.launcher_sessions.len() - next.launcher_sessions.len();
            if removed > 0 {
                write_atomic(&self.path, &next).await?;
                *state = next;
            }
            Ok(removed)
        })
    }
}

/// Write the store to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains product keys and bearer tokens.
async fn write_atomic(path: &Path, data: &StoreData) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("store path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".store.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp store file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting store file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp store file: {e}")))?;

    debug!(path = %path.display(), "persisted store");
    Ok(())
}
