//! S3-compatible archive storage adapter.
//!
//! This crate provides:
//! - Storage URL parsing into bucket/key pairs
//! - Object deletion
//! - Presigned, time-limited download URLs with a caller-chosen filename

pub mod client;
pub mod error;

pub use client::{parse_storage_url, ObjectStore, S3Storage, S3StorageConfig};
pub use error::{StorageError, StorageResult};
