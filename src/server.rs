use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::scheme::{assemble_batch, assemble_scheme, list_slugs, AssembleError, SchemeRecord};
use crate::upstream::{UpstreamClient, UpstreamError};

pub struct AppState {
    pub config: Config,
    pub upstream: UpstreamClient,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Scheme '{0}' not found")]
    NotFound(String),
    #[error("Upstream unavailable: {0}")]
    Unavailable(UpstreamError),
}

impl From<AssembleError> for AppError {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::NotFound(slug) => AppError::NotFound(slug),
            AssembleError::Upstream(e) => AppError::Unavailable(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

/// The frontend is served from anywhere (file://, localhost, a static
/// host), so CORS stays wide open.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/schemes", get(schemes_index))
        .route("/api/scheme/:slug", get(scheme_detail))
        .route("/api/schemes/batch", post(schemes_batch))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, port: u16) -> Result<()> {
    let app = router(state);
    let address = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("MyScheme proxy listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ── Handlers ──

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "MyScheme Backend Proxy is running!",
        "api_key_configured": !state.config.api_key.is_empty(),
    }))
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    from_index: usize,
    #[serde(default = "default_page_size")]
    size: usize,
}

fn default_page_size() -> usize {
    100
}

async fn schemes_index(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    // Bad query strings still get the JSON error envelope.
    let Query(params) = params.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let page = list_slugs(&state.upstream, params.from_index, params.size).await?;
    let returned = page.slugs.len();
    Ok(Json(json!({
        "slugs": page.slugs,
        "total": page.total,
        "from_index": params.from_index,
        "size": params.size,
        "returned": returned,
    })))
}

async fn scheme_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<SchemeRecord>, AppError> {
    let record = assemble_scheme(&state.upstream, &slug).await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct BatchRequest {
    #[serde(default)]
    slugs: Vec<String>,
}

async fn schemes_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<Value>, AppError> {
    if request.slugs.is_empty() {
        return Err(AppError::BadRequest("No slugs provided".to_string()));
    }
    let outcome = assemble_batch(&state.upstream, &request.slugs).await;
    let assembled = outcome.schemes.len();
    Ok(Json(json!({
        "schemes": outcome.schemes,
        "total": assembled,
        "requested": outcome.requested,
    })))
}

// ── Tests ──
