//! Control/inspection HTTP API

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::engine::Engine;

/// API application state
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
    pub api_key: String,
}

/// Build the axum router for the monitor's HTTP boundary
pub fn build_router(engine: Arc<Engine>, api_key: String) -> Router {
    let state = ApiState { engine, api_key };

    let protected = Router::new()
        .route("/check-service", post(check_service_handler))
        .route("/status-history", get(status_history_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Shared-secret check: `x-api-key` must match the configured key
async fn require_api_key(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    if provided != Some(state.api_key.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized: Invalid API key"})),
        )
            .into_response();
    }

    next.run(request).await
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Trigger one immediate check cycle of the monitored service
async fn check_service_handler(State(state): State<ApiState>) -> Response {
    let result = state.engine.check_once().await;

    if result.is_healthy() {
        (StatusCode::OK, Json(result)).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "Failed to check main service",
                "details": result.error,
            })),
        )
            .into_response()
    }
}

async fn status_history_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let history = state.engine.history();
    let snapshot = history.read().await.snapshot();
    Json(snapshot)
}
