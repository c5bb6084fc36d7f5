//! Trap collection gateway
//!
//! Single-binary HTTP service that:
//! 1. Logs browser users in through the identity provider (PKCE)
//! 2. Issues product keys and exchanges them for launcher bearer tokens
//! 3. Authorizes every protected route against its declared security scheme

mod checker;
mod config;
mod editions;
mod error;
mod games;
mod metrics;
mod oauth2;
mod session;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{FromRef, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Router, middleware};
use axum_extra::extract::cookie::Key;
use collection_auth::{LoginFlow, ProviderConfig, TraqProvider};
use launcher_keys::{LauncherCredentialService, spawn_session_sweeper};
use metrics_exporter_prometheus::PrometheusHandle;
use repository::{EditionRepository, FileStore, GameRepository, RoleRepository};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::checker::Checker;
use crate::config::Config;
use crate::session::SessionStore;

/// Time allowed for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    login: Arc<LoginFlow>,
    launcher: Arc<LauncherCredentialService>,
    checker: Checker,
    sessions: SessionStore,
    editions: Arc<dyn EditionRepository>,
    games: Arc<dyn GameRepository>,
    roles: Arc<dyn RoleRepository>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

// Lets handlers extract a `SignedCookieJar` directly.
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.key().clone()
    }
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(oauth2::routes(&state))
        .merge(editions::routes(&state))
        .merge(games::routes(&state))
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON output, LOG_LEVEL then RUST_LOG then info
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting collection-gateway");

    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        identity_provider = %config.identity_provider.base_url,
        store = %config.store.path.display(),
        "configuration loaded"
    );

    let store = Arc::new(
        FileStore::load(config.store.path.clone())
            .await
            .with_context(|| format!("failed to open store {}", config.store.path.display()))?,
    );

    let provider_config = ProviderConfig {
        base_url: config.identity_provider.base_url.clone(),
        client_id: config.identity_provider.client_id.clone(),
        timeout: config.identity_provider.timeout(),
    };
    let provider =
        TraqProvider::new(&provider_config).context("failed to build identity provider client")?;
    let login = Arc::new(LoginFlow::new(provider_config, Arc::new(provider)));

    let launcher = Arc::new(LauncherCredentialService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        config.launcher.session_ttl(),
    ));

    let secret = config
        .session
        .secret
        .as_ref()
        .context("session secret missing")?;
    let sessions = SessionStore::new(
        secret.as_str().as_bytes(),
        config.session.cookie_name.clone(),
        config.session.max_age_secs,
        config.session.secure,
    )
    .context("invalid session settings")?;

    let checker = Checker::new(launcher.clone(), store.clone(), store.clone());
    let sweeper = spawn_session_sweeper(store.clone(), config.launcher.sweep_interval());

    let state = AppState {
        login,
        launcher,
        checker,
        sessions,
        editions: store.clone(),
        games: store.clone(),
        roles: store,
        started_at: Instant::now(),
        prometheus,
    };

    let app = build_router(state, config.server.max_connections);
    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());
    sweeper.abort();

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
