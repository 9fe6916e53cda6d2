//! Cluster control-plane client.
//!
//! This crate provides:
//! - Typed job/pod objects as reported by the cluster
//! - Job spec and manifest types for submission
//! - The `ClusterApi` boundary trait and its REST implementation

pub mod client;
pub mod error;
pub mod spec;
pub mod types;

pub use client::{ClusterApi, ClusterConfig, KubeClient};
pub use error::{ClusterError, ClusterResult};
pub use spec::{EnvVar, JobSpec};
pub use types::{JobObject, JobStatusField, ObjectMeta, PodObject, PodStatusField};
