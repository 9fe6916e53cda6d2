//! Job spec and submission manifest types.

use std::collections::BTreeMap;

use serde::Serialize;

/// An environment variable passed to the worker container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A fully-specified capture job, ready for submission.
///
/// The name is the only handle needed to find, annotate, or delete the job
/// later; labels are query-filterable, annotations carry free-form
/// metadata, and env is visible only to the worker container.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub env: Vec<EnvVar>,
}

impl JobSpec {
    /// Render the batch/v1 Job manifest submitted to the cluster.
    pub fn to_manifest(&self, image: &str) -> JobManifest {
        JobManifest {
            api_version: "batch/v1",
            kind: "Job",
            metadata: ManifestMeta {
                name: self.name.clone(),
                labels: self.labels.clone(),
                annotations: self.annotations.clone(),
            },
            spec: JobManifestSpec {
                backoff_limit: 0,
                template: PodTemplate {
                    metadata: PodTemplateMeta {
                        labels: self.labels.clone(),
                    },
                    spec: PodSpec {
                        containers: vec![Container {
                            name: "worker".to_string(),
                            image: image.to_string(),
                            env: self.env.clone(),
                        }],
                        restart_policy: "Never",
                    },
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManifest {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ManifestMeta,
    pub spec: JobManifestSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestMeta {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManifestSpec {
    pub backoff_limit: u32,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, Serialize)]
pub struct PodTemplate {
    pub metadata: PodTemplateMeta,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct PodTemplateMeta {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub containers: Vec<Container>,
    pub restart_policy: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub env: Vec<EnvVar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        let mut labels = BTreeMap::new();
        labels.insert("jobid".to_string(), "abc123def456".to_string());
        labels.insert("index".to_string(), "0".to_string());
        let mut annotations = BTreeMap::new();
        annotations.insert("captureUrl".to_string(), "http://example.com".to_string());
        JobSpec {
            name: "capture-abc123def456-0".to_string(),
            labels,
            annotations,
            env: vec![EnvVar::new("CAPTURE_URL", "http://example.com")],
        }
    }

    #[test]
    fn test_manifest_shape() {
        let manifest = spec().to_manifest("registry.example/worker:1.0");
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["apiVersion"], "batch/v1");
        assert_eq!(json["kind"], "Job");
        assert_eq!(json["metadata"]["name"], "capture-abc123def456-0");
        assert_eq!(json["metadata"]["labels"]["jobid"], "abc123def456");
        assert_eq!(json["spec"]["backoffLimit"], 0);
        assert_eq!(
            json["spec"]["template"]["spec"]["restartPolicy"],
            "Never"
        );
        let container = &json["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["image"], "registry.example/worker:1.0");
        assert_eq!(container["env"][0]["name"], "CAPTURE_URL");
    }

    #[test]
    fn test_pod_template_carries_job_labels() {
        let manifest = spec().to_manifest("img");
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            json["spec"]["template"]["metadata"]["labels"]["index"],
            "0"
        );
    }
}
