//! Edition and product-key endpoints
//!
//! Admin routes manage keys through the session cookie. The launcher routes
//! authenticate with the bearer token minted by `/editions/authorize`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use launcher_keys::parse_status;
use repository::{Edition, EditionId, GameId, KeyStatus, LauncherCredential, ProductKeyId};
use uuid::Uuid;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::checker::{Guard, SecurityScheme, guard};
use crate::error::ApiError;
use crate::games::{GameFileResponse, GameResponse, load_game};
use crate::metrics;

pub fn routes(state: &AppState) -> Router<AppState> {
    let auth = |scheme| {
        middleware::from_fn_with_state(
            Guard::new(state.checker.clone(), state.sessions.clone(), scheme),
            guard,
        )
    };

    Router::new()
        .route("/editions/authorize", post(authorize))
        .route(
            "/editions/info",
            get(launcher_edition).route_layer(auth(SecurityScheme::LauncherAuth)),
        )
        .route(
            "/editions/games/{gameID}",
            get(launcher_game).route_layer(auth(SecurityScheme::EditionGameAuth)),
        )
        .route(
            "/editions/files/{gameFileID}",
            get(launcher_game_file).route_layer(auth(SecurityScheme::EditionGameFileAuth)),
        )
        .route(
            "/editions/{editionID}",
            get(get_edition).route_layer(auth(SecurityScheme::EditionAuth)),
        )
        .route(
            "/editions/{editionID}/games",
            get(edition_games).route_layer(auth(SecurityScheme::EditionIdAuth)),
        )
        .route(
            "/editions/{editionID}/keys",
            post(generate_keys)
                .get(list_keys)
                .route_layer(auth(SecurityScheme::AdminAuth)),
        )
        .route(
            "/editions/{editionID}/keys/{productKeyID}/activate",
            post(activate_key).route_layer(auth(SecurityScheme::AdminAuth)),
        )
        .route(
            "/editions/{editionID}/keys/{productKeyID}/revoke",
            post(revoke_key).route_layer(auth(SecurityScheme::AdminAuth)),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EditionResponse {
    id: EditionId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    questionnaire_url: Option<String>,
    created_at: u64,
}

impl From<Edition> for EditionResponse {
    fn from(edition: Edition) -> Self {
        Self {
            id: edition.id,
            name: edition.name,
            questionnaire_url: edition.questionnaire_url,
            created_at: edition.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductKeyResponse {
    id: ProductKeyId,
    key: String,
    status: KeyStatus,
    created_at: u64,
}

impl From<LauncherCredential> for ProductKeyResponse {
    fn from(credential: LauncherCredential) -> Self {
        Self {
            id: credential.id,
            key: credential.key.as_str().to_string(),
            status: credential.status,
            created_at: credential.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeRequest {
    key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
    access_token: String,
    /// Seconds until the token expires
    expires_in: u64,
}

/// Redeem a product key for a launcher access token.
async fn authorize(
    State(state): State<AppState>,
    Json(body): Json<AuthorizeRequest>,
) -> Result<(StatusCode, Json<AuthorizeResponse>), ApiError> {
    let session = match state.launcher.redeem(body.key.trim()).await {
        Ok(session) => session,
        Err(e) => {
            let label = match e {
                launcher_keys::Error::InvalidKey => "invalid_key",
                _ => "error",
            };
            metrics::record_launcher_authorization(label);
            return Err(e.into());
        }
    };

    metrics::record_launcher_authorization("ok");
    Ok((
        StatusCode::CREATED,
        Json(AuthorizeResponse {
            access_token: session.access_token.as_str().to_string(),
            expires_in: state.launcher.session_ttl().as_secs(),
        }),
    ))
}

async fn launcher_edition(Extension(edition): Extension<Edition>) -> Json<EditionResponse> {
    Json(edition.into())
}

async fn launcher_game(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
) -> Result<Json<GameResponse>, ApiError> {
    let game = load_game(&state, game_id).await?;
    Ok(Json(game.into()))
}

/// Metadata of one file from a game in the launcher's edition.
async fn launcher_game_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(edition): Extension<Edition>,
) -> Result<Json<GameFileResponse>, ApiError> {
    for id in edition.game_ids {
        let Some(game) = state.games.get_game(id).await? else {
            continue;
        };
        if let Some(file) = game.files.into_iter().find(|f| f.id == file_id) {
            return Ok(Json(file.into()));
        }
    }
    Err(ApiError::NotFound("game file not found".into()))
}

async fn get_edition(
    State(state): State<AppState>,
    Path(edition_id): Path<EditionId>,
) -> Result<Json<EditionResponse>, ApiError> {
    let edition = state
        .editions
        .get_edition(edition_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("edition not found".into()))?;
    Ok(Json(edition.into()))
}

/// Games of the launcher's edition. Games deleted since the edition was
/// assembled are skipped.
async fn edition_games(
    State(state): State<AppState>,
    Extension(edition): Extension<Edition>,
) -> Result<Json<Vec<GameResponse>>, ApiError> {
    let mut games = Vec::with_capacity(edition.game_ids.len());
    for id in edition.game_ids {
        if let Some(game) = state.games.get_game(id).await? {
            games.push(GameResponse::from(game));
        }
    }
    Ok(Json(games))
}

#[derive(Debug, Deserialize)]
struct GenerateQuery {
    num: Option<String>,
}

async fn generate_keys(
    State(state): State<AppState>,
    Path(edition_id): Path<EditionId>,
    Query(query): Query<GenerateQuery>,
) -> Result<(StatusCode, Json<Vec<ProductKeyResponse>>), ApiError> {
    let count = query
        .num
        .as_deref()
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or(launcher_keys::Error::InvalidKeyNum)?;

    let keys = state.launcher.generate_keys(edition_id, count).await?;
    Ok((
        StatusCode::CREATED,
        Json(keys.into_iter().map(ProductKeyResponse::from).collect()),
    ))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

async fn list_keys(
    State(state): State<AppState>,
    Path(edition_id): Path<EditionId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProductKeyResponse>>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let keys = state.launcher.list_keys(edition_id, status).await?;
    Ok(Json(keys.into_iter().map(ProductKeyResponse::from).collect()))
}

async fn activate_key(
    State(state): State<AppState>,
    Path((edition_id, key_id)): Path<(EditionId, ProductKeyId)>,
) -> Result<Json<ProductKeyResponse>, ApiError> {
    let key = state.launcher.activate(edition_id, key_id).await?;
    Ok(Json(key.into()))
}

async fn revoke_key(
    State(state): State<AppState>,
    Path((edition_id, key_id)): Path<(EditionId, ProductKeyId)>,
) -> Result<Json<ProductKeyResponse>, ApiError> {
    let key = state.launcher.revoke(edition_id, key_id).await?;
    info!(edition_id = %edition_id, product_key_id = %key_id, "product key revoked by admin");
    Ok(Json(key.into()))
}
