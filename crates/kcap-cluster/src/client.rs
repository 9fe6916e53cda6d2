//! Cluster REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::error::{ClusterError, ClusterResult};
use crate::spec::JobSpec;
use crate::types::{JobList, JobObject, PodList, PodObject};

/// Path to the in-cluster service account token, when running as a pod.
const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// The boundary contract against the cluster control plane.
///
/// Job names are unique cluster-side; creating a duplicate fails atomically
/// with a conflict, which the orchestrator relies on as its dedup guard.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submit a job. A duplicate name yields `ClusterError::AlreadyExists`.
    async fn create_job(&self, spec: &JobSpec) -> ClusterResult<()>;

    /// Fetch a job by name; `None` when the cluster has no such job.
    async fn get_job(&self, name: &str) -> ClusterResult<Option<JobObject>>;

    /// List jobs in the working namespace, optionally filtered by a label
    /// selector (empty string lists everything).
    async fn list_jobs(&self, label_selector: &str) -> ClusterResult<Vec<JobObject>>;

    /// Delete a job with foreground propagation: dependents are gone before
    /// the job record disappears.
    async fn delete_job(&self, name: &str) -> ClusterResult<()>;

    /// List pods in the Succeeded phase; these may outlive their owning job
    /// and are swept separately.
    async fn list_succeeded_pods(&self) -> ClusterResult<Vec<PodObject>>;

    /// Delete a pod by name.
    async fn delete_pod(&self, name: &str) -> ClusterResult<()>;
}

/// Configuration for the cluster client.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// API server base URL.
    pub api_url: String,
    /// Bearer token, if the API server requires one.
    pub token: Option<String>,
    /// Namespace all capture jobs live in.
    pub namespace: String,
    /// Worker container image for submitted jobs.
    pub job_image: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Accept the API server's certificate without verification
    /// (self-signed in-cluster CAs).
    pub insecure_tls: bool,
}

impl ClusterConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ClusterResult<Self> {
        let token = std::env::var("CLUSTER_TOKEN")
            .ok()
            .or_else(|| std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN_PATH).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            api_url: std::env::var("CLUSTER_API_URL")
                .unwrap_or_else(|_| "https://kubernetes.default.svc".to_string()),
            token,
            namespace: std::env::var("CLUSTER_NAMESPACE")
                .unwrap_or_else(|_| "captures".to_string()),
            job_image: std::env::var("CLUSTER_JOB_IMAGE")
                .map_err(|_| ClusterError::config_error("CLUSTER_JOB_IMAGE not set"))?,
            timeout: Duration::from_secs(
                std::env::var("CLUSTER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("CLUSTER_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            insecure_tls: std::env::var("CLUSTER_INSECURE_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

/// REST client for the cluster's batch and core APIs.
#[derive(Clone)]
pub struct KubeClient {
    http: Client,
    config: ClusterConfig,
}

impl KubeClient {
    /// Create a new client from configuration.
    pub fn new(config: ClusterConfig) -> ClusterResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(config.insecure_tls)
            .user_agent(concat!("kcap-cluster/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClusterError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClusterResult<Self> {
        Self::new(ClusterConfig::from_env()?)
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn jobs_url(&self) -> String {
        format!(
            "{}/apis/batch/v1/namespaces/{}/jobs",
            self.config.api_url.trim_end_matches('/'),
            self.config.namespace
        )
    }

    fn pods_url(&self) -> String {
        format!(
            "{}/api/v1/namespaces/{}/pods",
            self.config.api_url.trim_end_matches('/'),
            self.config.namespace
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn api_error(resource: &str, response: reqwest::Response) -> ClusterError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| format!("{} request failed", resource));
        ClusterError::Api { status, message }
    }
}

#[async_trait]
impl ClusterApi for KubeClient {
    async fn create_job(&self, spec: &JobSpec) -> ClusterResult<()> {
        let manifest = spec.to_manifest(&self.config.job_image);
        debug!(job = %spec.name, "Submitting job");

        let response = self
            .authorize(self.http.post(self.jobs_url()).json(&manifest))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!(job = %spec.name, "Job submitted");
                Ok(())
            }
            StatusCode::CONFLICT => Err(ClusterError::AlreadyExists(spec.name.clone())),
            _ => Err(Self::api_error("create_job", response).await),
        }
    }

    async fn get_job(&self, name: &str) -> ClusterResult<Option<JobObject>> {
        let url = format!("{}/{}", self.jobs_url(), name);
        let response = self.authorize(self.http.get(&url)).send().await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::api_error("get_job", response).await),
        }
    }

    async fn list_jobs(&self, label_selector: &str) -> ClusterResult<Vec<JobObject>> {
        let mut req = self.http.get(self.jobs_url());
        if !label_selector.is_empty() {
            req = req.query(&[("labelSelector", label_selector)]);
        }
        let response = self.authorize(req).send().await?;

        match response.status() {
            StatusCode::OK => {
                let list: JobList = response.json().await?;
                Ok(list.items)
            }
            _ => Err(Self::api_error("list_jobs", response).await),
        }
    }

    async fn delete_job(&self, name: &str) -> ClusterResult<()> {
        let url = format!("{}/{}", self.jobs_url(), name);
        let options = serde_json::json!({
            "kind": "DeleteOptions",
            "apiVersion": "v1",
            "propagationPolicy": "Foreground",
        });
        let response = self
            .authorize(self.http.delete(&url).json(&options))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => {
                info!(job = %name, "Job deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(ClusterError::not_found(name)),
            _ => Err(Self::api_error("delete_job", response).await),
        }
    }

    async fn list_succeeded_pods(&self) -> ClusterResult<Vec<PodObject>> {
        let response = self
            .authorize(
                self.http
                    .get(self.pods_url())
                    .query(&[("fieldSelector", "status.phase=Succeeded")]),
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let list: PodList = response.json().await?;
                Ok(list.items)
            }
            _ => Err(Self::api_error("list_pods", response).await),
        }
    }

    async fn delete_pod(&self, name: &str) -> ClusterResult<()> {
        let url = format!("{}/{}", self.pods_url(), name);
        let response = self.authorize(self.http.delete(&url)).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(()),
            StatusCode::NOT_FOUND => Err(ClusterError::not_found(name)),
            _ => Err(Self::api_error("delete_pod", response).await),
        }
    }
}
