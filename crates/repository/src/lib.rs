//! Persistence interfaces for the authorization core
//!
//! The credential service and the request dispatcher never touch storage
//! directly. They consume the narrow traits below, each returning
//! `Pin<Box<dyn Future>>` so implementations can sit behind `Arc<dyn ...>`.
//!
//! `FileStore` implements every trait over a single JSON file. It is the
//! store used by the gateway binary and by the tests across the workspace.

pub mod error;
pub mod file;
pub mod models;

pub use error::{Error, Result};
pub use file::FileStore;
pub use models::{
    Edition, EditionId, Game, GameFile, GameId, GameRole, KeyStatus, LauncherCredential,
    LauncherSession, LauncherSessionId, LauncherSessionInfo, ProductKeyId, UserId, Visibility,
};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every repository method.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Edition lookups.
pub trait EditionRepository: Send + Sync {
    fn get_edition(&self, id: EditionId) -> BoxFuture<'_, Result<Option<Edition>>>;
}

/// Game lookups. Doubles as the visibility resolver for the dispatcher.
pub trait GameRepository: Send + Sync {
    fn get_game(&self, id: GameId) -> BoxFuture<'_, Result<Option<Game>>>;

    /// Change a game's visibility. Fails with `Error::NotFound` for an unknown game.
    fn update_visibility(
        &self,
        id: GameId,
        visibility: Visibility,
    ) -> BoxFuture<'_, Result<Game>>;
}

/// Role lookups used after an identity has been authenticated.
pub trait RoleRepository: Send + Sync {
    /// Whether the user administers the whole collection.
    fn is_admin(&self, user: UserId) -> BoxFuture<'_, Result<bool>>;

    /// The user's management role on a game, if any.
    fn game_role(&self, game: GameId, user: UserId) -> BoxFuture<'_, Result<Option<GameRole>>>;

    /// All management roles on a game.
    fn game_managers(&self, game: GameId) -> BoxFuture<'_, Result<Vec<(UserId, GameRole)>>>;

    /// Whether the user is entitled to an edition.
    fn edition_access(&self, edition: EditionId, user: UserId) -> BoxFuture<'_, Result<bool>>;
}

/// Product key persistence.
pub trait ProductKeyRepository: Send + Sync {
    fn save_product_keys(
        &self,
        edition: EditionId,
        keys: Vec<LauncherCredential>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Keys of an edition whose status is in `statuses`, oldest first.
    fn list_product_keys(
        &self,
        edition: EditionId,
        statuses: Vec<KeyStatus>,
    ) -> BoxFuture<'_, Result<Vec<LauncherCredential>>>;

    /// A key by id, with the edition it belongs to.
    fn get_product_key(
        &self,
        id: ProductKeyId,
    ) -> BoxFuture<'_, Result<Option<(EditionId, LauncherCredential)>>>;

    /// A key by its key string.
    fn get_product_key_by_value<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<LauncherCredential>>>;

    /// Fails with `Error::NotFound` for an unknown key.
    fn update_product_key_status(
        &self,
        id: ProductKeyId,
        status: KeyStatus,
    ) -> BoxFuture<'_, Result<()>>;
}

/// Launcher bearer-session persistence.
pub trait LauncherSessionRepository: Send + Sync {
    fn save_launcher_session(
        &self,
        product_key: ProductKeyId,
        session: LauncherSession,
    ) -> BoxFuture<'_, Result<()>>;

    /// Session by bearer token, joined with its credential and edition.
    fn get_launcher_session<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Option<LauncherSessionInfo>>>;

    /// Remove sessions expired at `now_millis`. Returns how many were removed.
    fn delete_expired_launcher_sessions(&self, now_millis: u64) -> BoxFuture<'_, Result<usize>>;
}
