//! Domain records shared by the authorization core and its persistence
//!
//! Timestamps are unix milliseconds (see `common::now_millis`).

use std::fmt;

use common::Secret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Edition (launcher release) identifier
    EditionId
);
uuid_id!(GameId);
uuid_id!(
    /// Product key (launcher credential) identifier
    ProductKeyId
);
uuid_id!(LauncherSessionId);
uuid_id!(
    /// Identity-provider user identifier
    UserId
);

/// A named release grouping of games. Launcher credentials are scoped to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edition {
    pub id: EditionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questionnaire_url: Option<String>,
    #[serde(default)]
    pub game_ids: Vec<GameId>,
    /// Identities entitled to manage this edition from the browser side
    #[serde(default)]
    pub managers: Vec<UserId>,
    pub created_at: u64,
}

/// Per-game visibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Readable without any credential
    Public,
    /// Readable by any authenticated member
    Limited,
    /// Readable by authenticated members only
    Private,
}

impl Visibility {
    pub fn label(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Limited => "limited",
            Visibility::Private => "private",
        }
    }
}

/// Metadata for a stored game file. The binary itself lives in asset storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFile {
    pub id: Uuid,
    pub file_type: String,
    pub entry_point: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub files: Vec<GameFile>,
    pub created_at: u64,
}

/// Management role a user holds on a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameRole {
    Owner,
    Maintainer,
}

impl GameRole {
    /// Owners may edit roles and visibility.
    pub fn can_manage_roles(&self) -> bool {
        matches!(self, GameRole::Owner)
    }

    /// Both owners and maintainers may update game content.
    pub fn can_update_game(&self) -> bool {
        matches!(self, GameRole::Owner | GameRole::Maintainer)
    }
}

/// Product key status. Keys are never deleted, only deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Inactive,
}

/// A product key bound to exactly one edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherCredential {
    pub id: ProductKeyId,
    pub key: Secret<String>,
    pub status: KeyStatus,
    pub created_at: u64,
}

impl LauncherCredential {
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// A bearer session minted by redeeming an active product key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherSession {
    pub id: LauncherSessionId,
    pub access_token: Secret<String>,
    pub expires_at: u64,
}

impl LauncherSession {
    /// A session is usable strictly before `expires_at`.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at
    }
}

/// A launcher session joined with the credential and edition it was minted for.
#[derive(Debug, Clone)]
pub struct LauncherSessionInfo {
    pub session: LauncherSession,
    pub credential: LauncherCredential,
    pub edition: Edition,
}
