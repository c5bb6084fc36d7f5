//! Per-endpoint authorization
//!
//! Each protected route declares one `SecurityScheme`. The guard middleware
//! reads the session cookie, the Authorization header and the path params,
//! runs the scheme's strategy and either forwards the request with the
//! resulting `Grant` in its extensions or answers with the denial.
//!
//! Every strategy yields one of three results: granted, denied with a
//! reason, or a hard error (lookup failure, misconfigured route).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::SignedCookieJar;
use collection_auth::{Authentication, UserIdentity, authenticate};
use common::now_millis;
use launcher_keys::{LauncherCredentialService, is_valid_access_token};
use repository::{Edition, EditionId, GameId, GameRepository, RoleRepository, Visibility};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;
use crate::session::{ClientSession, SessionStore};

const NO_ACCESS_TOKEN: &str = "no access token";

/// Authorization strategy declared by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityScheme {
    /// Logged-in member with a live identity session
    TrapMemberAuth,
    /// Member who administers the collection
    AdminAuth,
    /// Member owning `{gameID}` (admins pass)
    GameOwnerAuth,
    /// Member owning or maintaining `{gameID}` (admins pass)
    GameMaintainerAuth,
    /// Member entitled to `{editionID}`
    EditionAuth,
    /// Launcher bearer token
    LauncherAuth,
    /// Launcher bearer token for exactly `{editionID}`
    EditionIdAuth,
    /// Launcher bearer token whose edition contains `{gameID}`
    EditionGameAuth,
    /// Launcher bearer token whose edition contains the game owning
    /// `{gameFileID}`
    EditionGameFileAuth,
    /// Game metadata, readable anonymously when the game is public
    GameInfoVisibilityAuth,
    /// Game files, readable anonymously when the game is public
    GameFileVisibilityAuth,
}

impl SecurityScheme {
    pub fn name(&self) -> &'static str {
        match self {
            SecurityScheme::TrapMemberAuth => "TrapMemberAuth",
            SecurityScheme::AdminAuth => "AdminAuth",
            SecurityScheme::GameOwnerAuth => "GameOwnerAuth",
            SecurityScheme::GameMaintainerAuth => "GameMaintainerAuth",
            SecurityScheme::EditionAuth => "EditionAuth",
            SecurityScheme::LauncherAuth => "LauncherAuth",
            SecurityScheme::EditionIdAuth => "EditionIDAuth",
            SecurityScheme::EditionGameAuth => "EditionGameAuth",
            SecurityScheme::EditionGameFileAuth => "EditionGameFileAuth",
            SecurityScheme::GameInfoVisibilityAuth => "GameInfoVisibilityAuth",
            SecurityScheme::GameFileVisibilityAuth => "GameFileVisibilityAuth",
        }
    }
}

/// What a successful check attaches to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Member(UserIdentity),
    Launcher(Edition),
    /// Public resource, no credential presented
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    InvalidRequest(String),
    Unauthenticated(&'static str),
    Forbidden(&'static str),
    NotFound(&'static str),
}

impl Denial {
    fn label(&self) -> &'static str {
        match self {
            Denial::InvalidRequest(_) => "invalid_request",
            Denial::Unauthenticated(_) => "unauthenticated",
            Denial::Forbidden(_) => "forbidden",
            Denial::NotFound(_) => "not_found",
        }
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::InvalidRequest(m) => ApiError::BadRequest(m),
            Denial::Unauthenticated(m) => ApiError::Unauthorized(m.into()),
            Denial::Forbidden(m) => ApiError::Forbidden(m.into()),
            Denial::NotFound(m) => ApiError::NotFound(m.into()),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Granted(Grant),
    Denied(Denial),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("route has no path parameter {0}")]
    MissingParam(&'static str),

    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Early exit from a strategy.
enum Stop {
    Denied(Denial),
    Failed(CheckError),
}

impl From<Denial> for Stop {
    fn from(d: Denial) -> Self {
        Stop::Denied(d)
    }
}

impl From<CheckError> for Stop {
    fn from(e: CheckError) -> Self {
        Stop::Failed(e)
    }
}

impl From<repository::Error> for Stop {
    fn from(e: repository::Error) -> Self {
        Stop::Failed(CheckError::Lookup(e.to_string()))
    }
}

/// Credentials and routing data of one request.
pub struct RequestCredentials<'a> {
    pub session: Option<&'a ClientSession>,
    pub authorization: Option<&'a str>,
    pub params: &'a HashMap<String, String>,
}

#[derive(Clone)]
pub struct Checker {
    launcher: Arc<LauncherCredentialService>,
    games: Arc<dyn GameRepository>,
    roles: Arc<dyn RoleRepository>,
}

impl Checker {
    pub fn new(
        launcher: Arc<LauncherCredentialService>,
        games: Arc<dyn GameRepository>,
        roles: Arc<dyn RoleRepository>,
    ) -> Self {
        Self {
            launcher,
            games,
            roles,
        }
    }

    pub async fn check(
        &self,
        scheme: SecurityScheme,
        req: &RequestCredentials<'_>,
        now_millis: u64,
    ) -> Result<CheckOutcome, CheckError> {
        let result = match scheme {
            SecurityScheme::TrapMemberAuth => self
                .member(req.session, now_millis)
                .map(Grant::Member)
                .map_err(Stop::from),
            SecurityScheme::AdminAuth => self.admin(req, now_millis).await,
            SecurityScheme::GameOwnerAuth => self.game_role(req, now_millis, true).await,
            SecurityScheme::GameMaintainerAuth => self.game_role(req, now_millis, false).await,
            SecurityScheme::EditionAuth => self.edition_member(req, now_millis).await,
            SecurityScheme::LauncherAuth => self
                .launcher_edition(req.authorization, now_millis)
                .await
                .map(Grant::Launcher),
            SecurityScheme::EditionIdAuth => self.edition_id(req, now_millis).await,
            SecurityScheme::EditionGameAuth => self.edition_game(req, now_millis).await,
            SecurityScheme::EditionGameFileAuth => self.edition_game_file(req, now_millis).await,
            SecurityScheme::GameInfoVisibilityAuth | SecurityScheme::GameFileVisibilityAuth => {
                self.visibility(req, now_millis).await
            }
        };

        match result {
            Ok(grant) => Ok(CheckOutcome::Granted(grant)),
            Err(Stop::Denied(denial)) => Ok(CheckOutcome::Denied(denial)),
            Err(Stop::Failed(e)) => Err(e),
        }
    }

    /// Identity session check. Never contacts the identity provider.
    fn member(
        &self,
        session: Option<&ClientSession>,
        now_millis: u64,
    ) -> Result<UserIdentity, Denial> {
        let identity = session.and_then(|s| s.identity.as_ref());
        match authenticate(identity, now_millis) {
            Authentication::Valid => session
                .and_then(|s| s.user.clone())
                .ok_or(Denial::Unauthenticated(NO_ACCESS_TOKEN)),
            Authentication::Expired => {
                info!("access token is expired");
                Err(Denial::Unauthenticated(NO_ACCESS_TOKEN))
            }
            Authentication::NoSession => Err(Denial::Unauthenticated(NO_ACCESS_TOKEN)),
        }
    }

    async fn admin(&self, req: &RequestCredentials<'_>, now: u64) -> Result<Grant, Stop> {
        let user = self.member(req.session, now)?;
        if !self.roles.is_admin(user.id).await? {
            return Err(Denial::Forbidden("you are not admin").into());
        }
        Ok(Grant::Member(user))
    }

    async fn game_role(
        &self,
        req: &RequestCredentials<'_>,
        now: u64,
        owner_only: bool,
    ) -> Result<Grant, Stop> {
        let user = self.member(req.session, now)?;
        let game_id: GameId = path_id(req.params, "gameID")?;

        if self.roles.is_admin(user.id).await? {
            return Ok(Grant::Member(user));
        }

        let allowed = match self.roles.game_role(game_id, user.id).await? {
            Some(role) if owner_only => role.can_manage_roles(),
            Some(role) => role.can_update_game(),
            None => false,
        };
        if !allowed {
            let reason = if owner_only {
                "you are not owner of this game"
            } else {
                "you are not maintainer of this game"
            };
            return Err(Denial::Forbidden(reason).into());
        }
        Ok(Grant::Member(user))
    }

    async fn edition_member(&self, req: &RequestCredentials<'_>, now: u64) -> Result<Grant, Stop> {
        let user = self.member(req.session, now)?;
        let edition_id: EditionId = path_id(req.params, "editionID")?;
        if !self.roles.edition_access(edition_id, user.id).await? {
            return Err(Denial::Forbidden("you have no access to this edition").into());
        }
        Ok(Grant::Member(user))
    }

    /// Bearer token check: header shape, token format, then session lookup.
    async fn launcher_edition(
        &self,
        authorization: Option<&str>,
        now: u64,
    ) -> Result<Edition, Stop> {
        let header = authorization.ok_or(Denial::Unauthenticated(NO_ACCESS_TOKEN))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Denial::InvalidRequest("invalid authorization header".into()))?;
        if !is_valid_access_token(token) {
            return Err(Denial::Unauthenticated("invalid access token").into());
        }

        match self.launcher.validate_session_at(token, now).await {
            Ok(info) => Ok(info.edition),
            Err(launcher_keys::Error::InvalidToken) => {
                Err(Denial::Unauthenticated("invalid access token").into())
            }
            Err(launcher_keys::Error::Expired) => {
                Err(Denial::Unauthenticated("expired access token").into())
            }
            Err(e) => Err(CheckError::Lookup(e.to_string()).into()),
        }
    }

    async fn edition_id(&self, req: &RequestCredentials<'_>, now: u64) -> Result<Grant, Stop> {
        let edition = self.launcher_edition(req.authorization, now).await?;
        let edition_id: EditionId = path_id(req.params, "editionID")?;
        if edition.id != edition_id {
            return Err(Denial::Forbidden("invalid edition id").into());
        }
        Ok(Grant::Launcher(edition))
    }

    async fn edition_game(&self, req: &RequestCredentials<'_>, now: u64) -> Result<Grant, Stop> {
        let edition = self.launcher_edition(req.authorization, now).await?;
        let game_id: GameId = path_id(req.params, "gameID")?;
        if !edition.game_ids.contains(&game_id) {
            return Err(Denial::Forbidden("game is not in this edition").into());
        }
        Ok(Grant::Launcher(edition))
    }

    async fn edition_game_file(
        &self,
        req: &RequestCredentials<'_>,
        now: u64,
    ) -> Result<Grant, Stop> {
        let edition = self.launcher_edition(req.authorization, now).await?;
        let file_id: Uuid = path_id(req.params, "gameFileID")?;
        for game_id in &edition.game_ids {
            let Some(game) = self.games.get_game(*game_id).await? else {
                continue;
            };
            if game.files.iter().any(|f| f.id == file_id) {
                return Ok(Grant::Launcher(edition));
            }
        }
        Err(Denial::Forbidden("game file is not in this edition").into())
    }

    /// Identity is checked opportunistically; only a public game tolerates
    /// its absence or expiry.
    async fn visibility(&self, req: &RequestCredentials<'_>, now: u64) -> Result<Grant, Stop> {
        let member = self.member(req.session, now);
        let game_id: GameId = path_id(req.params, "gameID")?;
        let game = self
            .games
            .get_game(game_id)
            .await?
            .ok_or(Denial::NotFound("game not found"))?;

        match (game.visibility, member) {
            (_, Ok(user)) => Ok(Grant::Member(user)),
            (Visibility::Public, Err(_)) => Ok(Grant::Anonymous),
            (visibility, Err(denial)) => {
                debug!(%game_id, visibility = visibility.label(), "non-public game requires login");
                Err(denial.into())
            }
        }
    }
}

/// Parse a UUID path parameter. A missing parameter means the route and its
/// scheme disagree, which is a server defect.
fn path_id<T: From<Uuid>>(params: &HashMap<String, String>, name: &'static str) -> Result<T, Stop> {
    let raw = params.get(name).ok_or(CheckError::MissingParam(name))?;
    Uuid::parse_str(raw)
        .map(T::from)
        .map_err(|_| Denial::InvalidRequest(format!("invalid {name}")).into())
}

/// State for the guard middleware of one route.
#[derive(Clone)]
pub struct Guard {
    checker: Checker,
    sessions: SessionStore,
    scheme: SecurityScheme,
}

impl Guard {
    pub fn new(checker: Checker, sessions: SessionStore, scheme: SecurityScheme) -> Self {
        Self {
            checker,
            sessions,
            scheme,
        }
    }
}

/// Middleware enforcing a route's security scheme.
///
/// On success the `Grant` is inserted into the request extensions, together
/// with the `UserIdentity` or launcher `Edition` it carries.
pub async fn guard(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
        .await
        .map(|Path(p)| p)
        .unwrap_or_default();
    let jar = SignedCookieJar::from_headers(&parts.headers, guard.sessions.key().clone());
    let session = guard.sessions.get(&jar);
    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let scheme = guard.scheme;
    let credentials = RequestCredentials {
        session: session.as_ref(),
        authorization,
        params: &params,
    };
    let outcome = guard
        .checker
        .check(scheme, &credentials, now_millis())
        .await;

    match outcome {
        Ok(CheckOutcome::Granted(grant)) => {
            let label = match &grant {
                Grant::Member(user) => {
                    parts.extensions.insert(user.clone());
                    "granted"
                }
                Grant::Launcher(edition) => {
                    parts.extensions.insert(edition.clone());
                    "granted"
                }
                Grant::Anonymous => "anonymous",
            };
            metrics::record_auth_check(scheme.name(), label);
            parts.extensions.insert(grant);
            next.run(Request::from_parts(parts, body)).await
        }
        Ok(CheckOutcome::Denied(denial)) => {
            info!(
                scheme = scheme.name(),
                ?params,
                reason = ?denial,
                "request rejected"
            );
            metrics::record_auth_check(scheme.name(), denial.label());
            ApiError::from(denial).into_response()
        }
        Err(e) => {
            error!(scheme = scheme.name(), ?params, error = %e, "authorization check failed");
            metrics::record_auth_check(scheme.name(), "error");
            ApiError::Internal(e.to_string()).into_response()
        }
    }
}
