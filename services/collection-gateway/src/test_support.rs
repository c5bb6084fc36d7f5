//! Shared fixtures for gateway tests

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum_extra::extract::SignedCookieJar;
use collection_auth::{
    Error as AuthError, IdentityProvider, IdentitySession, LoginFlow, ProviderConfig,
    TokenResponse, UserIdentity,
};
use common::{Secret, now_millis};
use launcher_keys::LauncherCredentialService;
use repository::{
    BoxFuture, Edition, EditionId, FileStore, Game, GameFile, GameId, UserId, Visibility,
};
use uuid::Uuid;

use crate::AppState;
use crate::checker::Checker;
use crate::session::{ClientSession, SessionStore};

pub const SECRET: &[u8] = b"test-secret-test-secret-test-secret!";
pub const COOKIE: &str = "collection_session";

pub struct Fixture {
    _dir: tempfile::TempDir,
    pub store: Arc<FileStore>,
    pub launcher: Arc<LauncherCredentialService>,
    pub checker: Checker,
    pub sessions: SessionStore,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            FileStore::load(dir.path().join("store.json"))
                .await
                .unwrap(),
        );
        let launcher = Arc::new(LauncherCredentialService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Duration::from_secs(3600),
        ));
        let checker = Checker::new(launcher.clone(), store.clone(), store.clone());
        let sessions = SessionStore::new(SECRET, COOKIE, 3600, false).unwrap();
        Self {
            _dir: dir,
            store,
            launcher,
            checker,
            sessions,
        }
    }

    pub async fn game(&self, visibility: Visibility) -> GameId {
        let game = Game {
            id: GameId::new(),
            name: format!("{} game", visibility.label()),
            description: "a test game".into(),
            visibility,
            files: vec![],
            created_at: now_millis(),
        };
        let id = game.id;
        self.store.insert_game(game).await.unwrap();
        id
    }

    /// A game carrying one downloadable file. Returns the game and file ids.
    pub async fn game_with_file(&self, visibility: Visibility) -> (GameId, Uuid) {
        let file = GameFile {
            id: Uuid::new_v4(),
            file_type: "jar".into(),
            entry_point: "game.jar".into(),
        };
        let file_id = file.id;
        let game = Game {
            id: GameId::new(),
            name: format!("{} game", visibility.label()),
            description: "a test game with a file".into(),
            visibility,
            files: vec![file],
            created_at: now_millis(),
        };
        let id = game.id;
        self.store.insert_game(game).await.unwrap();
        (id, file_id)
    }

    pub async fn edition(&self, game_ids: Vec<GameId>, managers: Vec<UserId>) -> EditionId {
        let edition = Edition {
            id: EditionId::new(),
            name: "test edition".into(),
            questionnaire_url: None,
            game_ids,
            managers,
            created_at: now_millis(),
        };
        let id = edition.id;
        self.store.insert_edition(edition).await.unwrap();
        id
    }

    /// Issue a key for the edition and redeem it.
    pub async fn launcher_token(&self, edition: EditionId) -> String {
        let key = self
            .launcher
            .generate_keys(edition, 1)
            .await
            .unwrap()
            .remove(0);
        let session = self.launcher.redeem(key.key.as_str()).await.unwrap();
        session.access_token.as_str().to_string()
    }

    /// `Cookie` header value carrying `session`, signed like a real response.
    pub fn cookie(&self, session: &ClientSession) -> String {
        let jar = SignedCookieJar::new(self.sessions.key().clone());
        let response = self.sessions.save(jar, session).unwrap().into_response();
        set_cookie_pair(&response).unwrap()
    }

    pub fn app_state(&self, provider: Arc<dyn IdentityProvider>) -> AppState {
        let login = Arc::new(LoginFlow::new(
            ProviderConfig::new("https://idp.example/api/v3", "client-1"),
            provider,
        ));
        AppState {
            login,
            launcher: self.launcher.clone(),
            checker: self.checker.clone(),
            sessions: self.sessions.clone(),
            editions: self.store.clone(),
            games: self.store.clone(),
            roles: self.store.clone(),
            started_at: Instant::now(),
            prometheus: metrics_exporter_prometheus::PrometheusBuilder::new()
                .build_recorder()
                .handle(),
        }
    }
}

/// The `name=value` part of a response's first Set-Cookie header.
pub fn set_cookie_pair(response: &axum::response::Response) -> Option<String> {
    let header = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    header.split(';').next().map(str::to_string)
}

/// A logged-in session for a fresh user.
pub fn member_session(name: &str, expires_at: u64) -> (UserIdentity, ClientSession) {
    let user = UserIdentity {
        id: UserId::new(),
        name: name.into(),
    };
    let session = ClientSession {
        identity: Some(IdentitySession {
            access_token: Secret::from("idp-token"),
            expires_at,
            refresh_token: None,
        }),
        user: Some(user.clone()),
        auth_state: None,
    };
    (user, session)
}

/// Identity provider double accepting the code `good`.
pub struct FakeProvider {
    pub user: UserIdentity,
    pub revoke_ok: bool,
    pub revoked: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            user: UserIdentity {
                id: UserId::new(),
                name: "alice".into(),
            },
            revoke_ok: true,
            revoked: Mutex::new(vec![]),
        }
    }
}

impl IdentityProvider for FakeProvider {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        _verifier: &'a str,
    ) -> BoxFuture<'a, collection_auth::Result<TokenResponse>> {
        Box::pin(async move {
            match code {
                "good" => Ok(TokenResponse {
                    token_type: "Bearer".into(),
                    access_token: "tok".into(),
                    expires_in: 3600,
                    refresh_token: None,
                }),
                "down" => Err(AuthError::Upstream {
                    status: 503,
                    body: String::new(),
                }),
                _ => Err(AuthError::InvalidStateOrCode),
            }
        })
    }

    fn fetch_me<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, collection_auth::Result<UserIdentity>> {
        Box::pin(async move {
            if access_token == "tok" {
                Ok(self.user.clone())
            } else {
                Err(AuthError::InvalidSession)
            }
        })
    }

    fn revoke<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, collection_auth::Result<()>> {
        Box::pin(async move {
            if !self.revoke_ok {
                return Err(AuthError::Upstream {
                    status: 500,
                    body: String::new(),
                });
            }
            self.revoked.lock().unwrap().push(access_token.to_string());
            Ok(())
        })
    }
}
