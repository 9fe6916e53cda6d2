//! Capture job orchestration.
//!
//! Stateless between requests: every answer is reconstructed from cluster
//! labels/annotations and storage presence. The cluster is the sole source
//! of truth; nothing here caches derived status.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use kcap_cluster::{ClusterApi, ClusterError, JobObject};
use kcap_models::{
    decode_annotation, derive_status, encode_annotation, CaptureId, CaptureJob, CaptureRequest,
    JobId, JobStatus,
};
use kcap_storage::ObjectStore;

use crate::config::CaptureConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::builder::JobSpecBuilder;

/// Result of a capture submission: how many URLs actually became jobs.
#[derive(Debug, Clone, Serialize)]
pub struct StartJobResponse {
    /// The count of successfully submitted capture jobs; equal to the
    /// length of `jobids` and at most the number of requested URLs.
    pub urls: usize,
    pub jobids: Vec<CaptureId>,
}

/// Filter for listing capture jobs. Unsupplied fields are omitted from the
/// label selector, not wildcarded.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub userid: Option<String>,
    pub jobid: Option<String>,
    pub index: Option<u32>,
}

impl JobFilter {
    /// Translate into a cluster label selector.
    pub fn label_selector(&self) -> String {
        let mut parts = Vec::new();
        if let Some(userid) = self.userid.as_deref().filter(|v| !v.is_empty()) {
            parts.push(format!("userid={}", userid));
        }
        if let Some(jobid) = self.jobid.as_deref().filter(|v| !v.is_empty()) {
            parts.push(format!("jobid={}", jobid));
        }
        if let Some(index) = self.index {
            parts.push(format!("index={}", index));
        }
        parts.join(",")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteJobResponse {
    pub deleted: bool,
}

/// Orchestrates capture jobs against the cluster and the archive store.
pub struct Orchestrator {
    builder: JobSpecBuilder,
    cluster: Arc<dyn ClusterApi>,
    storage: Arc<dyn ObjectStore>,
}

impl Orchestrator {
    pub fn new(
        config: &CaptureConfig,
        cluster: Arc<dyn ClusterApi>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            builder: JobSpecBuilder::new(config),
            cluster,
            storage,
        }
    }

    /// The cluster handle, shared with the reaper.
    pub fn cluster(&self) -> Arc<dyn ClusterApi> {
        Arc::clone(&self.cluster)
    }

    /// The storage handle, shared with the reaper.
    pub fn storage(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.storage)
    }

    /// Launch one cluster job per requested URL.
    ///
    /// Submissions run concurrently and independently: one URL failing to
    /// submit does not roll back the others. The response reports what
    /// actually made it to the cluster.
    pub async fn start_job(&self, request: &CaptureRequest) -> StartJobResponse {
        let jobid = JobId::generate();

        let submissions = request.urls.iter().enumerate().map(|(index, url)| {
            let id = CaptureId::new(jobid.clone(), index as u32);
            self.submit_one(id, url, request)
        });

        let jobids: Vec<CaptureId> = futures_util::future::join_all(submissions)
            .await
            .into_iter()
            .flatten()
            .collect();

        StartJobResponse {
            urls: jobids.len(),
            jobids,
        }
    }

    async fn submit_one(
        &self,
        id: CaptureId,
        url: &str,
        request: &CaptureRequest,
    ) -> Option<CaptureId> {
        let mut built = self.builder.build(&id, url, request);

        // The access URL is computable before the job runs; the content
        // behind it is only guaranteed once the job is Complete.
        let access_url = match self
            .storage
            .presign_download(&built.storage_url, &download_filename(url))
            .await
        {
            Ok(access_url) => access_url,
            Err(e) => {
                warn!(job = %id, error = %e, "Failed to presign access URL, skipping submission");
                return None;
            }
        };
        built
            .spec
            .annotations
            .insert("accessUrl".to_string(), encode_annotation(&access_url));

        match self.cluster.create_job(&built.spec).await {
            Ok(()) => {
                info!(job = %id, %url, "Capture job submitted");
                Some(id)
            }
            Err(e) if e.is_conflict() => {
                warn!(job = %id, "Job name already taken, skipping duplicate submission");
                None
            }
            Err(e) => {
                warn!(job = %id, error = %e, "Failed to submit capture job");
                None
            }
        }
    }

    /// List capture jobs matching the filter, status derived fresh from
    /// cluster state on every call.
    pub async fn list_jobs(&self, filter: &JobFilter) -> ApiResult<Vec<CaptureJob>> {
        let cluster_jobs = self.cluster.list_jobs(&filter.label_selector()).await?;

        let mut jobs = Vec::with_capacity(cluster_jobs.len());
        for cluster_job in &cluster_jobs {
            let Some(job) = capture_job_from_cluster(cluster_job) else {
                warn!(job = %cluster_job.metadata.name, "Ignoring job without capture identity");
                continue;
            };
            job.check_access_url().map_err(|e| {
                ApiError::internal(format!("job {}: {}", cluster_job.metadata.name, e))
            })?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Delete a capture job and its archive.
    ///
    /// A supplied userid must match the job's owner label; a mismatch is
    /// reported exactly like a missing job. Storage cleanup is best-effort:
    /// a dangling object beats a job reference nothing can reclaim.
    pub async fn delete_job(
        &self,
        id: &CaptureId,
        userid: Option<&str>,
    ) -> ApiResult<DeleteJobResponse> {
        let name = id.job_name();

        let Some(job) = self.cluster.get_job(&name).await? else {
            return Ok(DeleteJobResponse { deleted: false });
        };

        if let Some(userid) = userid.filter(|u| !u.is_empty()) {
            if job.label("userid") != Some(userid) {
                return Ok(DeleteJobResponse { deleted: false });
            }
        }

        if let Some(storage_url) = job.annotation("storageUrl") {
            let storage_url = decode_annotation(storage_url);
            if let Err(e) = self.storage.delete_object(&storage_url).await {
                warn!(job = %name, error = %e, "Failed to delete archive object, removing job anyway");
            }
        }

        match self.cluster.delete_job(&name).await {
            Ok(()) => Ok(DeleteJobResponse { deleted: true }),
            Err(ClusterError::NotFound(_)) => Ok(DeleteJobResponse { deleted: false }),
            Err(e) => Err(e.into()),
        }
    }

    /// Stop a job's compute resources without touching its archive. The
    /// relay calls this on every session exit.
    pub async fn stop_worker(&self, id: &CaptureId) -> ApiResult<()> {
        match self.cluster.delete_job(&id.job_name()).await {
            Ok(()) | Err(ClusterError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reconstruct a caller-facing job record from a cluster job object.
///
/// Returns `None` for jobs in the namespace that carry no capture
/// identity. The access URL is surfaced only for Complete jobs.
pub(crate) fn capture_job_from_cluster(job: &JobObject) -> Option<CaptureJob> {
    let id = match (job.label("jobid"), job.label("index")) {
        (Some(jobid), Some(index)) => {
            CaptureId::new(JobId::from_string(jobid), index.parse().ok()?)
        }
        _ => CaptureId::from_job_name(&job.metadata.name)?,
    };

    let status = derive_status(job.is_active(), job.is_failed(), job.is_succeeded());
    let access_url = if status == JobStatus::Complete {
        job.annotation("accessUrl").map(decode_annotation)
    } else {
        None
    };

    Some(CaptureJob {
        jobid: id.jobid,
        index: id.index,
        userid: job.label("userid").unwrap_or_default().to_string(),
        capture_url: job
            .annotation("captureUrl")
            .map(decode_annotation)
            .unwrap_or_default(),
        use_embeds: job.annotation("useEmbeds") == Some("1"),
        user_tag: job
            .annotation("userTag")
            .map(decode_annotation)
            .unwrap_or_default(),
        start_time: job.status.start_time,
        elapsed_time: job.status.completion_time.unwrap_or_else(Utc::now),
        access_url,
        status,
    })
}

/// The filename the archive should carry when a user follows the download
/// link: capture host, then the date.
fn download_filename(capture_url: &str) -> String {
    let (host, port) = match Url::parse(capture_url) {
        Ok(url) => (
            url.host_str().unwrap_or("capture").to_string(),
            url.port().map(|p| p.to_string()).unwrap_or_default(),
        ),
        Err(_) => ("capture".to_string(), String::new()),
    };
    format!("{}{}-{}.wacz", host, port, Utc::now().format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kcap_cluster::{JobStatusField, ObjectMeta};
    use validator::Validate;

    use super::*;
    use crate::testutil::{FakeCluster, FakeStore};

    fn orchestrator(cluster: Arc<FakeCluster>, store: Arc<FakeStore>) -> Orchestrator {
        Orchestrator::new(&CaptureConfig::default(), cluster, store)
    }

    fn request(urls: &[&str]) -> CaptureRequest {
        let mut request = CaptureRequest::single(urls[0]);
        request.urls = urls.iter().map(|u| u.to_string()).collect();
        request.validate().unwrap();
        request
    }

    #[tokio::test]
    async fn test_start_job_submits_one_job_per_url() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::default());
        let orch = orchestrator(Arc::clone(&cluster), Arc::clone(&store));

        let response = orch
            .start_job(&request(&["http://example.com", "http://example.org/b"]))
            .await;

        assert_eq!(response.urls, 2);
        assert_eq!(response.jobids.len(), 2);
        // Same request-scoped jobid, distinct indexes, reconstructible names.
        assert_eq!(response.jobids[0].jobid, response.jobids[1].jobid);
        for id in &response.jobids {
            let round_trip: CaptureId = id.to_string().parse().unwrap();
            assert_eq!(&round_trip, id);
            assert!(cluster.jobs.lock().unwrap().contains_key(&id.job_name()));
        }
    }

    #[tokio::test]
    async fn test_start_job_partial_failure_is_not_rolled_back() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.fail_creates_matching("-1");
        let store = Arc::new(FakeStore::default());
        let orch = orchestrator(Arc::clone(&cluster), store);

        let response = orch
            .start_job(&request(&["http://example.com", "http://example.org"]))
            .await;

        assert_eq!(response.urls, 1);
        assert_eq!(response.jobids.len(), 1);
        assert_eq!(response.jobids[0].index, 0);
        assert_eq!(cluster.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submitted_jobs_carry_presigned_access_url() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::default());
        let orch = orchestrator(Arc::clone(&cluster), Arc::clone(&store));

        let response = orch.start_job(&request(&["http://example.com"])).await;
        let name = response.jobids[0].job_name();

        let jobs = cluster.jobs.lock().unwrap();
        let annotation = jobs[&name].annotation("accessUrl").unwrap();
        assert!(decode_annotation(annotation).contains("presigned"));
    }

    #[tokio::test]
    async fn test_annotation_round_trip_through_list() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::default());
        let orch = orchestrator(Arc::clone(&cluster), store);

        let mut req = request(&["http://example.com/?a=1&b=<2>"]);
        req.tag = "tag & <markup>".into();
        orch.start_job(&req).await;

        let jobs = orch.list_jobs(&JobFilter::default()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].user_tag, "tag & <markup>");
        assert_eq!(jobs[0].capture_url, "http://example.com/?a=1&b=<2>");
    }

    #[tokio::test]
    async fn test_list_filter_builds_label_selector() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::default());
        let orch = orchestrator(Arc::clone(&cluster), store);

        let filter = JobFilter {
            userid: Some("2193".into()),
            jobid: Some("abc123def456".into()),
            index: Some(0),
        };
        orch.list_jobs(&filter).await.unwrap();
        assert_eq!(
            cluster.last_selector.lock().unwrap().as_deref(),
            Some("userid=2193,jobid=abc123def456,index=0")
        );

        orch.list_jobs(&JobFilter::default()).await.unwrap();
        assert_eq!(cluster.last_selector.lock().unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_delete_with_mismatched_userid_touches_nothing() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::default());
        let orch = orchestrator(Arc::clone(&cluster), Arc::clone(&store));

        let mut req = request(&["http://example.com"]);
        req.userid = "owner".into();
        let id = orch.start_job(&req).await.jobids.remove(0);
        store.put_object(&id.storage_url("s3://captures/jobs/"));

        let response = orch.delete_job(&id, Some("intruder")).await.unwrap();

        assert!(!response.deleted);
        assert!(cluster.jobs.lock().unwrap().contains_key(&id.job_name()));
        assert!(store.has_object(&id.storage_url("s3://captures/jobs/")));
        assert!(!cluster
            .trace
            .calls()
            .iter()
            .any(|c| c.starts_with("delete_job")));
    }

    #[tokio::test]
    async fn test_delete_removes_storage_before_job() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::with_trace(Arc::clone(&cluster.trace)));
        let orch = orchestrator(Arc::clone(&cluster), Arc::clone(&store));

        let mut req = request(&["http://example.com"]);
        req.userid = "owner".into();
        let id = orch.start_job(&req).await.jobids.remove(0);

        let response = orch.delete_job(&id, Some("owner")).await.unwrap();
        assert!(response.deleted);

        let calls = cluster.trace.calls();
        let storage_pos = calls
            .iter()
            .position(|c| c.starts_with("delete_object"))
            .unwrap();
        let job_pos = calls
            .iter()
            .position(|c| c.starts_with("delete_job"))
            .unwrap();
        assert!(storage_pos < job_pos);
    }

    #[tokio::test]
    async fn test_delete_survives_storage_failure() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::default());
        store.fail_deletes();
        let orch = orchestrator(Arc::clone(&cluster), store);

        let id = orch
            .start_job(&request(&["http://example.com"]))
            .await
            .jobids
            .remove(0);

        let response = orch.delete_job(&id, None).await.unwrap();
        assert!(response.deleted);
        assert!(!cluster.jobs.lock().unwrap().contains_key(&id.job_name()));
    }

    #[tokio::test]
    async fn test_delete_missing_job_is_negative_result() {
        let cluster = Arc::new(FakeCluster::default());
        let store = Arc::new(FakeStore::default());
        let orch = orchestrator(cluster, store);

        let id: CaptureId = "nosuchjob-0".parse().unwrap();
        let response = orch.delete_job(&id, None).await.unwrap();
        assert!(!response.deleted);
    }

    fn cluster_job(active: i64, failed: i64, succeeded: i64, access_url: bool) -> JobObject {
        let mut job = JobObject {
            metadata: ObjectMeta {
                name: "capture-abc123def456-0".to_string(),
                ..Default::default()
            },
            status: JobStatusField {
                active: Some(active),
                failed: Some(failed),
                succeeded: Some(succeeded),
                start_time: Some(Utc::now()),
                completion_time: None,
            },
        };
        job.metadata
            .labels
            .insert("jobid".into(), "abc123def456".into());
        job.metadata.labels.insert("index".into(), "0".into());
        job.metadata
            .annotations
            .insert("captureUrl".into(), "http://example.com".into());
        job.metadata.annotations.insert("userTag".into(), "".into());
        if access_url {
            job.metadata.annotations.insert(
                "accessUrl".into(),
                encode_annotation("http://minio/captures/abc123def456/0.wacz?sig=x&e=1"),
            );
        }
        job
    }

    #[test]
    fn test_access_url_surfaces_only_for_complete() {
        // Every non-Complete status hides the annotation even when present.
        let cases = [
            (1, 0, 0, JobStatus::InProgress),
            (0, 1, 0, JobStatus::Failed),
            (0, 1, 1, JobStatus::Failed),
            (0, 0, 0, JobStatus::Unknown),
        ];
        for (active, failed, succeeded, expected) in cases {
            let job = capture_job_from_cluster(&cluster_job(active, failed, succeeded, true))
                .unwrap();
            assert_eq!(job.status, expected);
            assert!(job.access_url.is_none());
            assert!(job.check_access_url().is_ok());
        }

        let complete = capture_job_from_cluster(&cluster_job(0, 0, 1, true)).unwrap();
        assert_eq!(complete.status, JobStatus::Complete);
        assert_eq!(
            complete.access_url.as_deref(),
            Some("http://minio/captures/abc123def456/0.wacz?sig=x&e=1")
        );
        assert!(complete.check_access_url().is_ok());

        // Complete without an access URL is a contract violation.
        let broken = capture_job_from_cluster(&cluster_job(0, 0, 1, false)).unwrap();
        assert!(broken.check_access_url().is_err());
    }

    #[test]
    fn test_unlabeled_cluster_jobs_are_ignored() {
        let job = JobObject {
            metadata: ObjectMeta {
                name: "unrelated-job".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(capture_job_from_cluster(&job).is_none());
    }

    #[test]
    fn test_download_filename_shape() {
        let name = download_filename("http://example.com:8080/page");
        assert!(name.starts_with("example.com8080-"));
        assert!(name.ends_with(".wacz"));

        let name = download_filename("http://example.com/page");
        assert!(name.starts_with("example.com-"));
    }
}
