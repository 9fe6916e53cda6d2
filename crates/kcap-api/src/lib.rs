//! Axum HTTP/WS capture orchestration service.
//!
//! This crate provides:
//! - REST routes for creating, listing, and deleting capture jobs
//! - WebSocket capture-and-watch relay sessions
//! - The job spec builder, orchestrator, and reaper services

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
pub mod worker;
pub mod ws;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::CaptureConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{JobFilter, Orchestrator, Reaper};
pub use state::AppState;
