//! Game endpoints
//!
//! Reads are gated by the game's visibility; role listing and visibility
//! changes by the caller's management role on the game.

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Extension, Json, Router, middleware};
use repository::{Game, GameFile, GameId, GameRole, UserId, Visibility};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::checker::{Grant, Guard, SecurityScheme, guard};
use crate::error::ApiError;

pub fn routes(state: &AppState) -> Router<AppState> {
    let auth = |scheme| {
        middleware::from_fn_with_state(
            Guard::new(state.checker.clone(), state.sessions.clone(), scheme),
            guard,
        )
    };

    Router::new()
        .route(
            "/games/{gameID}",
            get(get_game).route_layer(auth(SecurityScheme::GameInfoVisibilityAuth)),
        )
        .route(
            "/games/{gameID}/files",
            get(game_files).route_layer(auth(SecurityScheme::GameFileVisibilityAuth)),
        )
        .route(
            "/games/{gameID}/roles",
            get(game_roles).route_layer(auth(SecurityScheme::GameMaintainerAuth)),
        )
        .route(
            "/games/{gameID}/visibility",
            patch(update_visibility).route_layer(auth(SecurityScheme::GameOwnerAuth)),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    id: GameId,
    name: String,
    description: String,
    visibility: Visibility,
    created_at: u64,
}

impl From<Game> for GameResponse {
    fn from(game: Game) -> Self {
        Self {
            id: game.id,
            name: game.name,
            description: game.description,
            visibility: game.visibility,
            created_at: game.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFileResponse {
    id: Uuid,
    file_type: String,
    entry_point: String,
}

impl From<GameFile> for GameFileResponse {
    fn from(file: GameFile) -> Self {
        Self {
            id: file.id,
            file_type: file.file_type,
            entry_point: file.entry_point,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleResponse {
    user_id: UserId,
    role: GameRole,
}

#[derive(Debug, Deserialize)]
struct VisibilityRequest {
    visibility: Visibility,
}

pub async fn load_game(state: &AppState, id: GameId) -> Result<Game, ApiError> {
    state
        .games
        .get_game(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("game not found".into()))
}

async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
) -> Result<Json<GameResponse>, ApiError> {
    Ok(Json(load_game(&state, game_id).await?.into()))
}

async fn game_files(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
    Extension(grant): Extension<Grant>,
) -> Result<Json<Vec<GameFileResponse>>, ApiError> {
    let game = load_game(&state, game_id).await?;
    if grant == Grant::Anonymous {
        info!(%game_id, files = game.files.len(), "anonymous file listing of public game");
    }
    Ok(Json(game.files.into_iter().map(Into::into).collect()))
}

async fn game_roles(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
) -> Result<Json<Vec<RoleResponse>>, ApiError> {
    load_game(&state, game_id).await?;
    let managers = state.roles.game_managers(game_id).await?;
    Ok(Json(
        managers
            .into_iter()
            .map(|(user_id, role)| RoleResponse { user_id, role })
            .collect(),
    ))
}

async fn update_visibility(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
    Extension(user): Extension<collection_auth::UserIdentity>,
    Json(body): Json<VisibilityRequest>,
) -> Result<Json<GameResponse>, ApiError> {
    let game = state
        .games
        .update_visibility(game_id, body.visibility)
        .await?;
    info!(
        %game_id,
        user_id = %user.id,
        visibility = body.visibility.label(),
        "game visibility changed"
    );
    Ok(Json(game.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, COOKIE};
    use axum::http::{Request, StatusCode};
    use common::now_millis;
    use tower::ServiceExt;

    use crate::build_router;
    use crate::test_support::{FakeProvider, Fixture, member_session};

    use super::*;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app(fx: &Fixture) -> Router {
        build_router(fx.app_state(Arc::new(FakeProvider::new())), 16)
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn set_visibility(game: GameId, cookie: &str, visibility: &str) -> Request<Body> {
        Request::patch(format!("/games/{game}/visibility"))
            .header(COOKIE, cookie)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "visibility": visibility }).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn public_game_is_readable_anonymously() {
        let fx = Fixture::new().await;
        let game = fx.game(Visibility::Public).await;

        let response = app(&fx)
            .oneshot(get(&format!("/games/{game}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["visibility"], "public");
        assert_eq!(json["id"], game.to_string());
    }

    #[tokio::test]
    async fn private_game_requires_live_identity() {
        let fx = Fixture::new().await;
        let app = app(&fx);
        let game = fx.game(Visibility::Private).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/games/{game}/files"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (_, expired) = member_session("alice", now_millis() - 1);
        let response = app
            .clone()
            .oneshot(get(
                &format!("/games/{game}/files"),
                Some(&fx.cookie(&expired)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (_, live) = member_session("alice", now_millis() + 60_000);
        let response = app
            .oneshot(get(&format!("/games/{game}/files"), Some(&fx.cookie(&live))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let fx = Fixture::new().await;
        let response = app(&fx)
            .oneshot(get(&format!("/games/{}", GameId::new()), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "game not found");
    }

    #[tokio::test]
    async fn malformed_game_id_is_bad_request() {
        let fx = Fixture::new().await;
        let response = app(&fx)
            .oneshot(get("/games/not-a-uuid", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn maintainers_list_roles_but_only_owners_change_visibility() {
        let fx = Fixture::new().await;
        let app = app(&fx);
        let game = fx.game(Visibility::Limited).await;
        let (owner, owner_session) = member_session("owner", now_millis() + 60_000);
        let (maintainer, maintainer_session) = member_session("maint", now_millis() + 60_000);
        fx.store
            .set_game_role(game, owner.id, GameRole::Owner)
            .await
            .unwrap();
        fx.store
            .set_game_role(game, maintainer.id, GameRole::Maintainer)
            .await
            .unwrap();
        let owner_cookie = fx.cookie(&owner_session);
        let maintainer_cookie = fx.cookie(&maintainer_session);

        let response = app
            .clone()
            .oneshot(get(&format!("/games/{game}/roles"), Some(&maintainer_cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(set_visibility(game, &maintainer_cookie, "public"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(set_visibility(game, &owner_cookie, "public"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["visibility"], "public");

        // Now readable without any credential
        let response = app
            .oneshot(get(&format!("/games/{game}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_bypasses_game_roles() {
        let fx = Fixture::new().await;
        let game = fx.game(Visibility::Private).await;
        let (admin, session) = member_session("root", now_millis() + 60_000);
        fx.store.grant_admin(admin.id).await.unwrap();

        let response = app(&fx)
            .oneshot(set_visibility(game, &fx.cookie(&session), "limited"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stranger_cannot_list_roles() {
        let fx = Fixture::new().await;
        let game = fx.game(Visibility::Public).await;
        let (_, session) = member_session("eve", now_millis() + 60_000);

        let response = app(&fx)
            .oneshot(get(&format!("/games/{game}/roles"), Some(&fx.cookie(&session))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await["error"],
            "you are not maintainer of this game"
        );
    }
}
