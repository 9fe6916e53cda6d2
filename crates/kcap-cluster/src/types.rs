//! Typed cluster objects, read side.
//!
//! Only the fields the orchestration core consumes are modeled; everything
//! else in the cluster's response is ignored on deserialization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object metadata: name plus the label/annotation maps the core uses as
/// its only persistent state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Job status block as reported by the cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusField {
    #[serde(default)]
    pub active: Option<i64>,
    #[serde(default)]
    pub failed: Option<i64>,
    #[serde(default)]
    pub succeeded: Option<i64>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
}

/// A job object as reported by the cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: JobStatusField,
}

impl JobObject {
    pub fn is_active(&self) -> bool {
        self.status.active.unwrap_or(0) > 0
    }

    pub fn is_failed(&self) -> bool {
        self.status.failed.unwrap_or(0) > 0
    }

    pub fn is_succeeded(&self) -> bool {
        self.status.succeeded.unwrap_or(0) > 0
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct JobList {
    #[serde(default)]
    pub items: Vec<JobObject>,
}

/// Pod status block; pods expose their own start time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatusField {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// A pod object as reported by the cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatusField,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PodList {
    #[serde(default)]
    pub items: Vec<PodObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_object_parses_cluster_json() {
        let json = serde_json::json!({
            "metadata": {
                "name": "capture-abc123def456-0",
                "labels": {"jobid": "abc123def456", "index": "0", "userid": "2193"},
                "annotations": {"captureUrl": "http://example.com"}
            },
            "status": {
                "succeeded": 1,
                "startTime": "2020-11-03T20:59:00Z",
                "completionTime": "2020-11-03T20:59:29Z"
            }
        });
        let job: JobObject = serde_json::from_value(json).unwrap();
        assert!(job.is_succeeded());
        assert!(!job.is_active());
        assert_eq!(job.label("userid"), Some("2193"));
        assert_eq!(job.annotation("captureUrl"), Some("http://example.com"));
        assert!(job.status.start_time.is_some());
    }

    #[test]
    fn test_job_object_tolerates_missing_status() {
        let job: JobObject =
            serde_json::from_value(serde_json::json!({"metadata": {"name": "capture-x-0"}}))
                .unwrap();
        assert!(!job.is_active() && !job.is_failed() && !job.is_succeeded());
    }
}
