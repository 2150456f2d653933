use axum::{Json, Router, response::IntoResponse, routing::get};

use crate::{
    modules,
    web::{AppState, landing},
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing::landing_page))
        .route("/health", get(health))
        .merge(modules::review::router())
        .merge(modules::search::router())
        .with_state(state)
}

/// Liveness probe. Deliberately touches no external dependency.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
