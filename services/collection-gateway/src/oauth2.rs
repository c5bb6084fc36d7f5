//! Browser login endpoints
//!
//! `/oauth2/code` starts a PKCE login and parks the verifier in the session
//! cookie, `/oauth2/callback` completes it, `/oauth2/logout` revokes the
//! identity-provider token and clears the cookie.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use axum_extra::extract::SignedCookieJar;
use collection_auth::UserIdentity;
use common::now_millis;
use serde::Deserialize;
use tracing::{info, warn};

use crate::AppState;
use crate::checker::{Guard, SecurityScheme, guard};
use crate::error::ApiError;
use crate::metrics;

pub fn routes(state: &AppState) -> Router<AppState> {
    let member = middleware::from_fn_with_state(
        Guard::new(
            state.checker.clone(),
            state.sessions.clone(),
            SecurityScheme::TrapMemberAuth,
        ),
        guard,
    );

    Router::new()
        .route("/oauth2/code", get(start_login))
        .route("/oauth2/callback", get(callback))
        .route("/oauth2/logout", post(logout))
        .route("/users/me", get(me).route_layer(member))
}

fn failure_label(e: &collection_auth::Error) -> &'static str {
    if e.is_client_error() {
        "client_error"
    } else {
        "upstream_error"
    }
}

/// Redirect to the identity provider with a fresh PKCE challenge.
async fn start_login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), ApiError> {
    let (url, auth_state) = state.login.begin().inspect_err(|e| {
        metrics::record_login_step("begin", failure_label(e));
    })?;

    let mut session = state.sessions.get_or_create(&jar);
    session.auth_state = Some(auth_state);
    let jar = state.sessions.save(jar, &session)?;

    metrics::record_login_step("begin", "ok");
    Ok((jar, Redirect::to(&url)))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(SignedCookieJar, Json<UserIdentity>), ApiError> {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        metrics::record_login_step("callback", "client_error");
        return Err(ApiError::BadRequest("missing code".into()));
    };

    let mut session = state.sessions.get_or_create(&jar);
    let login = match state
        .login
        .callback(
            session.auth_state.as_ref(),
            &code,
            query.state.as_deref(),
            now_millis(),
        )
        .await
    {
        Ok(login) => login,
        Err(e) => {
            warn!(error = %e, "login callback failed");
            metrics::record_login_step("callback", failure_label(&e));
            return Err(e.into());
        }
    };

    session.identity = Some(login.session);
    session.user = Some(login.user.clone());
    session.auth_state = None;
    let jar = state.sessions.save(jar, &session)?;

    info!(user_id = %login.user.id, user = %login.user.name, "user logged in");
    metrics::record_login_step("callback", "ok");
    Ok((jar, Json(login.user)))
}

/// On failure the cookie is left untouched so the client can retry.
async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, StatusCode), ApiError> {
    let session = state.sessions.get(&jar);
    let identity = session.as_ref().and_then(|s| s.identity.as_ref());

    if let Err(e) = state.login.logout(identity).await {
        warn!(error = %e, "logout failed");
        metrics::record_login_step("logout", failure_label(&e));
        return Err(e.into());
    }

    metrics::record_login_step("logout", "ok");
    Ok((state.sessions.revoke(jar), StatusCode::OK))
}

async fn me(Extension(user): Extension<UserIdentity>) -> Json<UserIdentity> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header::{COOKIE, LOCATION};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::build_router;
    use crate::test_support::{FakeProvider, Fixture, member_session, set_cookie_pair};

    use super::*;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn query_param(url: &str, name: &str) -> String {
        let prefix = format!("{name}=");
        url.split(['?', '&'])
            .find_map(|pair| pair.strip_prefix(prefix.as_str()))
            .unwrap()
            .to_string()
    }

    /// Start a login and return the session cookie and the `state` value.
    async fn start(app: &Router) -> (String, String) {
        let response = app.clone().oneshot(get("/oauth2/code", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("https://idp.example/api/v3/oauth2/authorize?"));
        assert!(location.contains("code_challenge_method=S256"));
        let cookie = set_cookie_pair(&response).unwrap();
        (cookie, query_param(&location, "state"))
    }

    #[tokio::test]
    async fn full_login_sets_identity_and_me_returns_user() {
        let fx = Fixture::new().await;
        let provider = Arc::new(FakeProvider::new());
        let app = build_router(fx.app_state(provider.clone()), 16);

        let (cookie, state) = start(&app).await;
        let response = app
            .clone()
            .oneshot(get(
                &format!("/oauth2/callback?code=good&state={state}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie_pair(&response).unwrap();
        let json = body_json(response).await;
        assert_eq!(json["name"], "alice");

        let response = app.oneshot(get("/users/me", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], provider.user.id.to_string());
    }

    #[tokio::test]
    async fn callback_without_login_start_is_bad_request() {
        let fx = Fixture::new().await;
        let app = build_router(fx.app_state(Arc::new(FakeProvider::new())), 16);

        let response = app
            .oneshot(get("/oauth2/callback?code=good&state=x", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "no code verifier");
    }

    #[tokio::test]
    async fn callback_with_wrong_state_is_bad_request() {
        let fx = Fixture::new().await;
        let app = build_router(fx.app_state(Arc::new(FakeProvider::new())), 16);

        let (cookie, _) = start(&app).await;
        let response = app
            .oneshot(get(
                "/oauth2/callback?code=good&state=forged",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejected_code_is_bad_request_and_upstream_failure_is_500() {
        let fx = Fixture::new().await;
        let app = build_router(fx.app_state(Arc::new(FakeProvider::new())), 16);
        let (cookie, state) = start(&app).await;

        let response = app
            .clone()
            .oneshot(get(
                &format!("/oauth2/callback?code=stale&state={state}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid state or code");

        let response = app
            .oneshot(get(
                &format!("/oauth2/callback?code=down&state={state}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn me_without_session_is_unauthorized() {
        let fx = Fixture::new().await;
        let app = build_router(fx.app_state(Arc::new(FakeProvider::new())), 16);

        let response = app.oneshot(get("/users/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "no access token");
    }

    #[tokio::test]
    async fn logout_without_session_is_bad_request() {
        let fx = Fixture::new().await;
        let app = build_router(fx.app_state(Arc::new(FakeProvider::new())), 16);

        let request = Request::post("/oauth2/logout").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(set_cookie_pair(&response).is_none());
        assert_eq!(body_json(response).await["error"], "no auth session");
    }

    #[tokio::test]
    async fn logout_revokes_token_and_clears_cookie() {
        let fx = Fixture::new().await;
        let provider = Arc::new(FakeProvider::new());
        let app = build_router(fx.app_state(provider.clone()), 16);
        let (_, session) = member_session("alice", now_millis() + 60_000);
        let cookie = fx.cookie(&session);

        let request = Request::post("/oauth2/logout")
            .header(COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers()[axum::http::header::SET_COOKIE]
            .to_str()
            .unwrap();
        assert!(set_cookie.contains("Max-Age=0"));
        assert_eq!(*provider.revoked.lock().unwrap(), vec!["idp-token".to_string()]);
    }

    #[tokio::test]
    async fn failed_revoke_keeps_cookie() {
        let fx = Fixture::new().await;
        let mut provider = FakeProvider::new();
        provider.revoke_ok = false;
        let app = build_router(fx.app_state(Arc::new(provider)), 16);
        let (_, session) = member_session("alice", now_millis() + 60_000);

        let request = Request::post("/oauth2/logout")
            .header(COOKIE, fx.cookie(&session))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(set_cookie_pair(&response).is_none());
    }
}
