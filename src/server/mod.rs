//! HTTP service.
//!
//! Routes, all mounted under the configured base URL:
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `pep723widget/get-example` | [`handlers::get_example`] |
//! | POST | `pep723widget/initialize` | [`handlers::initialize`] |
//! | POST | `pep723widget/add-dependency` | [`handlers::add_dependency`] |
//! | POST | `pep723widget/get-tree` | [`handlers::get_tree`] |
//!
//! Error responses are `{ "error": <message> }` (see [`error::ApiError`]).

pub mod error;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::operations::ScriptService;
use crate::uv::ProcessRunner;

/// Path segment shared by every route.
pub const ROUTE_NAMESPACE: &str = "pep723widget";

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Operations backing the endpoints
    pub service: ScriptService,
}

impl AppState {
    /// Wrap `service`.
    #[must_use]
    pub const fn new(service: ScriptService) -> Self {
        Self {
            service,
        }
    }
}

/// Build the router.
///
/// `base_url` must start and end with `/`; see
/// [`ServerConfig::normalized_base_url`].
pub fn router(state: AppState, base_url: &str, max_body_bytes: usize) -> Router {
    let route = |name: &str| format!("{base_url}{ROUTE_NAMESPACE}/{name}");

    Router::new()
        .route(&route("get-example"), get(handlers::get_example))
        .route(&route("initialize"), post(handlers::initialize))
        .route(&route("add-dependency"), post(handlers::add_dependency))
        .route(&route("get-tree"), post(handlers::get_tree))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router described by `config` with real uv processes.
pub fn app_from_config(config: &ServerConfig) -> Result<Router> {
    let locator = config.locator()?;
    let scratch_root = config.scratch_root()?;
    let runner = ProcessRunner::with_timeout(config.tool_timeout());

    tracing::debug!("Scratch workspaces under {}", scratch_root.display());
    let service = ScriptService::new(Arc::new(locator), Arc::new(runner), scratch_root);

    Ok(router(AppState::new(service), &config.normalized_base_url(), config.max_body_bytes))
}

/// Bind the configured address and serve until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Fails when the configuration is invalid, the address cannot be bound, or
/// the server stops with an I/O error.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let app = app_from_config(&config)?;

    let listener =
        tokio::net::TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        "Listening on http://{}{}{}/",
        listener.local_addr().unwrap_or(addr),
        config.normalized_base_url(),
        ROUTE_NAMESPACE
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown requested");
}
