//! HTTP handlers.

pub mod captures;

use axum::Json;
use serde_json::{json, Value};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Readiness probe.
pub async fn ready() -> Json<Value> {
    Json(json!({"status": "ready"}))
}
