//! Capture job identity and derived status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Prefix for cluster job names.
pub const JOB_NAME_PREFIX: &str = "capture-";

/// Length of a generated request-scoped job identifier.
const JOBID_LEN: usize = 12;

/// Request-scoped job identifier, shared by every URL of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random, label-safe identifier.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..JOBID_LEN].to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a single capture job: one URL of one request.
///
/// The cluster job name, the storage key, and the wire form are all
/// reconstructible from the pair alone; no side table exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureId {
    pub jobid: JobId,
    pub index: u32,
}

impl CaptureId {
    pub fn new(jobid: JobId, index: u32) -> Self {
        Self { jobid, index }
    }

    /// The cluster job name for this capture.
    pub fn job_name(&self) -> String {
        format!("{}{}-{}", JOB_NAME_PREFIX, self.jobid, self.index)
    }

    /// Recover the identity from a cluster job name.
    pub fn from_job_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(JOB_NAME_PREFIX)?;
        rest.parse().ok()
    }

    /// Deterministic storage URL for this capture's archive.
    pub fn storage_url(&self, storage_prefix: &str) -> String {
        format!("{}{}/{}.wacz", storage_prefix, self.jobid, self.index)
    }
}

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.jobid, self.index)
    }
}

impl FromStr for CaptureId {
    type Err = JobRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (jobid, index) = s
            .rsplit_once('-')
            .ok_or_else(|| JobRecordError::InvalidId(s.to_string()))?;
        if jobid.is_empty() {
            return Err(JobRecordError::InvalidId(s.to_string()));
        }
        let index = index
            .parse()
            .map_err(|_| JobRecordError::InvalidId(s.to_string()))?;
        Ok(Self::new(JobId::from_string(jobid), index))
    }
}

impl Serialize for CaptureId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CaptureId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Derived status of a capture job. Never stored; recomputed from the
/// cluster-reported condition flags on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "In progress")]
    InProgress,
    #[serde(rename = "Complete")]
    Complete,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "In progress",
            JobStatus::Complete => "Complete",
            JobStatus::Failed => "Failed",
            JobStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the canonical status from the cluster condition flags.
///
/// Precedence: active, then failed, then succeeded. A job with no flag set
/// is Unknown, which callers must treat as a degenerate terminal state.
pub fn derive_status(active: bool, failed: bool, succeeded: bool) -> JobStatus {
    if active {
        JobStatus::InProgress
    } else if failed {
        JobStatus::Failed
    } else if succeeded {
        JobStatus::Complete
    } else {
        JobStatus::Unknown
    }
}

/// Errors in job record handling.
#[derive(Debug, Error)]
pub enum JobRecordError {
    #[error("invalid capture job id: {0}")]
    InvalidId(String),

    #[error("\"Complete\" capture jobs must have an accessUrl")]
    MissingAccessUrl,

    #[error("only \"Complete\" capture jobs may have an accessUrl")]
    UnexpectedAccessUrl,
}

/// A capture job as reported to callers, reconstructed from cluster state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureJob {
    pub jobid: JobId,
    pub index: u32,
    pub userid: String,
    pub capture_url: String,
    pub use_embeds: bool,
    pub user_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_url: Option<String>,
    pub status: JobStatus,
}

impl CaptureJob {
    /// The access URL travels with Complete jobs and only with them.
    pub fn check_access_url(&self) -> Result<(), JobRecordError> {
        match (self.status, self.access_url.is_some()) {
            (JobStatus::Complete, false) => Err(JobRecordError::MissingAccessUrl),
            (JobStatus::Complete, true) => Ok(()),
            (_, true) => Err(JobRecordError::UnexpectedAccessUrl),
            (_, false) => Ok(()),
        }
    }

    pub fn id(&self) -> CaptureId {
        CaptureId::new(self.jobid.clone(), self.index)
    }
}
