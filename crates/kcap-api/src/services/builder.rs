//! Job spec builder.
//!
//! Deterministically maps one URL of a validated capture request into a
//! fully-specified job description. Performs no I/O; everything a later
//! lookup needs is reconstructible from the capture id alone.

use std::collections::BTreeMap;

use kcap_cluster::{EnvVar, JobSpec};
use kcap_models::{encode_annotation, CaptureId, CaptureRequest};

use crate::config::CaptureConfig;

/// Builds cluster job specs from capture requests.
#[derive(Debug, Clone)]
pub struct JobSpecBuilder {
    storage_prefix: String,
    headless: bool,
}

/// A built spec plus the storage URL it was derived with.
pub struct BuiltSpec {
    pub spec: JobSpec,
    pub storage_url: String,
}

impl JobSpecBuilder {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            storage_prefix: config.storage_prefix.clone(),
            headless: config.headless,
        }
    }

    /// Build the spec for one URL of a request.
    ///
    /// Labels are query-filterable and restricted to the cluster label
    /// charset (guaranteed upstream by request validation). Annotation
    /// values go through the encode side of the annotation codec; readers
    /// must decode. Webhook material rides only in the worker env, never
    /// in annotations, which are visible via list/read APIs.
    pub fn build(&self, id: &CaptureId, url: &str, request: &CaptureRequest) -> BuiltSpec {
        let storage_url = id.storage_url(&self.storage_prefix);

        let mut labels = BTreeMap::new();
        labels.insert("userid".to_string(), request.userid.clone());
        labels.insert("jobid".to_string(), id.jobid.to_string());
        labels.insert("index".to_string(), id.index.to_string());

        let mut annotations = BTreeMap::new();
        annotations.insert("userTag".to_string(), encode_annotation(&request.tag));
        annotations.insert("captureUrl".to_string(), encode_annotation(url));
        annotations.insert("storageUrl".to_string(), encode_annotation(&storage_url));

        let mut env = vec![
            EnvVar::new("STORAGE_URL", &storage_url),
            EnvVar::new("CAPTURE_URL", url),
            EnvVar::new("USERID", &request.userid),
            EnvVar::new("JOBID", id.jobid.as_str()),
            EnvVar::new("JOB_INDEX", id.index.to_string()),
        ];
        if let Some(payload) = request.webhook_payload() {
            env.push(EnvVar::new("WEBHOOK_DATA", payload));
        }
        if !self.headless {
            env.push(EnvVar::new("DISABLE_CACHE", "1"));
        }
        if request.embeds {
            annotations.insert("useEmbeds".to_string(), "1".to_string());
            env.push(EnvVar::new("EMBEDS", "1"));
        }

        BuiltSpec {
            spec: JobSpec {
                name: id.job_name(),
                labels,
                annotations,
                env,
            },
            storage_url,
        }
    }
}
