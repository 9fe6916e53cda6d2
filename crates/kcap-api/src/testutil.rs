//! Hand-rolled fakes for the boundary traits, shared by service tests.
//!
//! The fakes record a call trace so tests can assert ordering guarantees
//! (archive delete before job delete) as well as counts.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use kcap_cluster::{
    ClusterApi, ClusterError, ClusterResult, JobObject, JobSpec, JobStatusField, ObjectMeta,
    PodObject,
};
use kcap_models::WorkerStatus;
use kcap_storage::{ObjectStore, StorageError, StorageResult};

use crate::worker::WorkerApi;

/// Shared, ordered record of boundary calls.
#[derive(Default)]
pub(crate) struct CallTrace {
    calls: Mutex<Vec<String>>,
}

impl CallTrace {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// In-memory cluster double.
pub(crate) struct FakeCluster {
    pub jobs: Mutex<BTreeMap<String, JobObject>>,
    pub pods: Mutex<BTreeMap<String, PodObject>>,
    pub trace: Arc<CallTrace>,
    pub last_selector: Mutex<Option<String>>,
    fail_create_patterns: Mutex<Vec<String>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(BTreeMap::new()),
            pods: Mutex::new(BTreeMap::new()),
            trace: Arc::new(CallTrace::default()),
            last_selector: Mutex::new(None),
            fail_create_patterns: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCluster {
    pub fn insert_job(&self, job: JobObject) {
        self.jobs.lock().unwrap().insert(job.metadata.name.clone(), job);
    }

    pub fn insert_pod(&self, pod: PodObject) {
        self.pods.lock().unwrap().insert(pod.metadata.name.clone(), pod);
    }

    /// Make `create_job` fail for any name ending with the suffix.
    pub fn fail_creates_matching(&self, suffix: &str) {
        self.fail_create_patterns
            .lock()
            .unwrap()
            .push(suffix.to_string());
    }

    pub fn create_count(&self) -> usize {
        self.trace
            .calls()
            .iter()
            .filter(|c| c.starts_with("create_job"))
            .count()
    }

    pub fn job_delete_count(&self) -> usize {
        self.trace
            .calls()
            .iter()
            .filter(|c| c.starts_with("delete_job"))
            .count()
    }
}

fn selector_matches(selector: &str, job: &JobObject) -> bool {
    if selector.is_empty() {
        return true;
    }
    selector.split(',').all(|part| match part.split_once('=') {
        Some((key, value)) => job.label(key) == Some(value),
        None => false,
    })
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn create_job(&self, spec: &JobSpec) -> ClusterResult<()> {
        self.trace.record(format!("create_job:{}", spec.name));

        let failing = self
            .fail_create_patterns
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| spec.name.ends_with(suffix.as_str()));
        if failing {
            return Err(ClusterError::Api {
                status: 500,
                message: "injected create failure".to_string(),
            });
        }

        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&spec.name) {
            return Err(ClusterError::AlreadyExists(spec.name.clone()));
        }
        jobs.insert(
            spec.name.clone(),
            JobObject {
                metadata: ObjectMeta {
                    name: spec.name.clone(),
                    labels: spec.labels.clone(),
                    annotations: spec.annotations.clone(),
                },
                status: JobStatusField {
                    active: Some(1),
                    start_time: Some(Utc::now()),
                    ..Default::default()
                },
            },
        );
        Ok(())
    }

    async fn get_job(&self, name: &str) -> ClusterResult<Option<JobObject>> {
        Ok(self.jobs.lock().unwrap().get(name).cloned())
    }

    async fn list_jobs(&self, label_selector: &str) -> ClusterResult<Vec<JobObject>> {
        *self.last_selector.lock().unwrap() = Some(label_selector.to_string());
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| selector_matches(label_selector, job))
            .cloned()
            .collect())
    }

    async fn delete_job(&self, name: &str) -> ClusterResult<()> {
        self.trace.record(format!("delete_job:{}", name));
        match self.jobs.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(ClusterError::not_found(name)),
        }
    }

    async fn list_succeeded_pods(&self) -> ClusterResult<Vec<PodObject>> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .values()
            .filter(|pod| pod.status.phase.as_deref() == Some("Succeeded"))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, name: &str) -> ClusterResult<()> {
        self.trace.record(format!("delete_pod:{}", name));
        match self.pods.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(ClusterError::not_found(name)),
        }
    }
}

/// In-memory object store double.
pub(crate) struct FakeStore {
    objects: Mutex<HashSet<String>>,
    pub trace: Arc<CallTrace>,
    fail_deletes: AtomicBool,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::with_trace(Arc::new(CallTrace::default()))
    }
}

impl FakeStore {
    /// Share a trace with another fake to assert cross-boundary ordering.
    pub fn with_trace(trace: Arc<CallTrace>) -> Self {
        Self {
            objects: Mutex::new(HashSet::new()),
            trace,
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn put_object(&self, storage_url: &str) {
        self.objects.lock().unwrap().insert(storage_url.to_string());
    }

    pub fn has_object(&self, storage_url: &str) -> bool {
        self.objects.lock().unwrap().contains(storage_url)
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn delete_object(&self, storage_url: &str) -> StorageResult<()> {
        self.trace.record(format!("delete_object:{}", storage_url));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::delete_failed("injected delete failure"));
        }
        // Deleting an absent object is a no-op, as at a real store.
        self.objects.lock().unwrap().remove(storage_url);
        Ok(())
    }

    async fn presign_download(&self, storage_url: &str, filename: &str) -> StorageResult<String> {
        self.trace.record(format!("presign:{}", storage_url));
        Ok(format!(
            "http://minio.local/presigned/{}?filename={}&sig=test",
            storage_url, filename
        ))
    }
}

/// Scripted worker status double.
pub(crate) struct FakeWorker {
    results: Mutex<VecDeque<anyhow::Result<WorkerStatus>>>,
    pub archive: Mutex<Option<Vec<u8>>>,
}

impl FakeWorker {
    pub fn scripted(results: Vec<anyhow::Result<WorkerStatus>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            archive: Mutex::new(None),
        }
    }
}

#[async_trait]
impl WorkerApi for FakeWorker {
    async fn status(&self, _job_name: &str) -> anyhow::Result<WorkerStatus> {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted status left")))
    }

    async fn fetch_archive(&self, _job_name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.archive.lock().unwrap().clone())
    }
}
