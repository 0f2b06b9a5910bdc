//! HTTP API over a [`ParserService`](figparse_core::service::ParserService).
//!
//! - `GET /health`
//! - `GET /files`, `POST /files` (`{"url": "..."}`, token in `X-Figma-Token` or `Authorization`)
//! - `GET /files/:id`, `GET /files/:id/components`, `GET /files/:id/instances`
//! - `GET /components/:id/instances`

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use figparse_core::{client::ApiCredential, FigparseError, UpstreamKind};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppService;

#[derive(Clone)]
struct AppState {
    service: Arc<AppService>,
}

#[derive(Debug, Deserialize)]
struct ParseRequest {
    url: String,
}

struct ApiError(FigparseError);

impl From<FigparseError> for ApiError {
    fn from(err: FigparseError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!("[server] {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn credential_from(headers: &HeaderMap) -> Result<ApiCredential, FigparseError> {
    let raw = headers
        .get("X-Figma-Token")
        .or_else(|| headers.get(axum::http::header::AUTHORIZATION))
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            FigparseError::upstream(UpstreamKind::Unauthorized, "an access token is required")
        })?;
    ApiCredential::new(raw)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_files(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.service.list_files().await?).into_response())
}

async fn create_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ParseRequest>,
) -> Result<Response, ApiError> {
    let credential = credential_from(&headers)?;
    let persisted = state
        .service
        .parse_and_persist(&request.url, &credential)
        .await?;
    Ok((StatusCode::CREATED, Json(persisted)).into_response())
}

async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.service.get_details(id).await?).into_response())
}

async fn file_components(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.service.components_for_file(id).await?).into_response())
}

async fn file_instances(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.service.instances_for_file(id).await?).into_response())
}

async fn component_instances(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(state.service.instances_for_component(id).await?).into_response())
}

pub fn router(service: Arc<AppService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/files", get(list_files).post(create_file))
        .route("/files/:id", get(get_file))
        .route("/files/:id/components", get(file_components))
        .route("/files/:id/instances", get(file_instances))
        .route("/components/:id/instances", get(component_instances))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

pub async fn serve(
    service: Arc<AppService>,
    bind: &str,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("figparse API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service).into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("figparse API shut down");
    Ok(())
}
