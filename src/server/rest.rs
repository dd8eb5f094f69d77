//! REST API endpoints.
//!
//! Exposes the coordinator's three operations over HTTP: trigger a scan,
//! report status, and search, plus health and metrics endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::coordinator::{IndexCoordinator, IndexStatus};
use crate::Error;

/// Request body for the `/index` endpoint.
#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    /// The project path to index; must match the server's configured root.
    pub project_path: String,
    /// When true, clear the existing index before scanning.
    #[serde(default)]
    pub force_reindex: bool,
}

/// Request body for the `/search` endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// The search query text.
    pub query: String,
    /// Number of top results to return.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

const fn default_top_k() -> usize {
    5
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Create the REST API router.
pub fn create_rest_router(coordinator: Arc<IndexCoordinator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/index", post(trigger_index))
        .route("/status/{*path}", get(get_status))
        .route("/search", post(search))
        .with_state(coordinator)
}

fn detail(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(serde_json::json!({ "detail": message.into() })),
    )
}

/// Health check endpoint.
async fn health_check(State(coordinator): State<Arc<IndexCoordinator>>) -> impl IntoResponse {
    let snapshot = coordinator.state_snapshot();
    let healthy = snapshot.status != IndexStatus::Error;

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// Prometheus metrics endpoint.
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; charset=utf-8",
            )],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(
                    axum::http::header::CONTENT_TYPE,
                    "text/plain; charset=utf-8",
                )],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}

/// Trigger the indexing scan. Always runs asynchronously relative to the
/// caller; a 202 only means the scan was admitted.
async fn trigger_index(
    State(coordinator): State<Arc<IndexCoordinator>>,
    Json(request): Json<IndexRequest>,
) -> impl IntoResponse {
    let configured = coordinator.project_root().to_string_lossy().to_string();
    if request.project_path != configured {
        // This instance manages exactly one root; proceed with it
        tracing::warn!(
            requested = %request.project_path,
            configured = %configured,
            "Index request for a different path; proceeding with configured path"
        );
    }

    let snapshot = coordinator.state_snapshot();
    match snapshot.status {
        IndexStatus::Initializing => {
            return detail(
                StatusCode::SERVICE_UNAVAILABLE,
                "Server is initializing, please try again later.",
            );
        }
        IndexStatus::Error => {
            let message = snapshot
                .last_error
                .unwrap_or_else(|| "Server is in an error state.".to_string());
            return detail(StatusCode::INTERNAL_SERVER_ERROR, message);
        }
        IndexStatus::Scanning | IndexStatus::Watching => {}
    }

    match Arc::clone(&coordinator).request_scan(request.force_reindex) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "message": format!("Indexing process initiated for {configured} in the background.")
            })),
        ),
        Err(Error::Conflict(_)) => {
            detail(StatusCode::CONFLICT, "A scan is already in progress.")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to start scan");
            detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Get indexing status for a project path.
///
/// Requests for a path this instance does not manage get a 404 body, not a
/// transport failure.
async fn get_status(
    State(coordinator): State<Arc<IndexCoordinator>>,
    UrlPath(path): UrlPath<String>,
) -> impl IntoResponse {
    let requested = normalize_requested_path(&path);

    if requested != coordinator.project_root() {
        tracing::warn!(
            requested = %requested.display(),
            configured = %coordinator.project_root().display(),
            "Status request for unmanaged path"
        );
        return detail(
            StatusCode::NOT_FOUND,
            "Project path not found or not managed by this server.",
        )
        .into_response();
    }

    let report = coordinator.status().await;
    (StatusCode::OK, Json(report)).into_response()
}

/// The wildcard capture drops nothing but may arrive without its leading
/// slash depending on how the client encoded the URL.
fn normalize_requested_path(raw: &str) -> PathBuf {
    let candidate = PathBuf::from(raw);
    let candidate = if candidate.is_absolute() {
        candidate
    } else {
        PathBuf::from("/").join(candidate)
    };
    candidate.canonicalize().unwrap_or(candidate)
}

/// Search the index.
async fn search(
    State(coordinator): State<Arc<IndexCoordinator>>,
    Json(request): Json<SearchRequest>,
) -> impl IntoResponse {
    let snapshot = coordinator.state_snapshot();
    match snapshot.status {
        IndexStatus::Initializing => {
            return detail(
                StatusCode::SERVICE_UNAVAILABLE,
                "Server is initializing, please try again later.",
            );
        }
        IndexStatus::Scanning => {
            return detail(
                StatusCode::SERVICE_UNAVAILABLE,
                "A scan is in progress, please try again later.",
            );
        }
        IndexStatus::Error => {
            let message = snapshot
                .last_error
                .unwrap_or_else(|| "Server is in an error state.".to_string());
            return detail(StatusCode::INTERNAL_SERVER_ERROR, message);
        }
        IndexStatus::Watching => {}
    }

    match coordinator.search(&request.query, request.top_k).await {
        Ok(results) => (
            StatusCode::OK,
            Json(serde_json::json!({ "results": results })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Search failed");
            detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Search failed: {e}"),
            )
        }
    }
}
