//! API routes.

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::captures::{
    delete_capture_job, download_capture, list_capture_jobs, start_capture_jobs,
};
use crate::handlers::{health, ready};
use crate::state::AppState;
use crate::ws::{ws_capture, ws_embed};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let capture_routes = Router::new()
        .route("/captures", post(start_capture_jobs))
        .route("/captures", get(list_capture_jobs))
        .route("/capture/:jobid", delete(delete_capture_job))
        .route("/capture/:jobid/download", get(download_capture));

    let ws_routes = Router::new()
        .route("/ws/capture", get(ws_capture))
        .route("/ws/embed", get(ws_embed));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let max_body_size = state.config.max_body_size;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(capture_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
