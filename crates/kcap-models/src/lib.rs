//! Shared data models for the KubeCaptures backend.
//!
//! This crate provides Serde-serializable types for:
//! - Capture requests and webhook descriptors
//! - Capture job identity and derived status
//! - The annotation value codec (cluster templating escape quirk)
//! - Relay wire messages for the WebSocket capture flow

pub mod annotations;
pub mod job;
pub mod relay;
pub mod request;

// Re-export common types
pub use annotations::{decode_annotation, encode_annotation};
pub use job::{derive_status, CaptureId, CaptureJob, JobId, JobRecordError, JobStatus, JOB_NAME_PREFIX};
pub use relay::{RelayMessage, WorkerStatus};
pub use request::{CaptureRequest, SigningAlgorithm, Webhook, K8S_LABEL_PATTERN};
