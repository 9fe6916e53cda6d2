//! Cluster client error types.

use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur talking to the cluster control plane.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Failed to configure cluster client: {0}")]
    ConfigError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Cluster API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClusterError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Duplicate-name conflicts double as the dedup guard for retried
    /// submissions; callers treat them as a failed (not fatal) submit.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists(_))
    }
}
