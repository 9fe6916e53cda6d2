//! Per-job worker status client.
//!
//! Each capture job exposes a small status server reachable at a hostname
//! derived from the job name. The relay polls `/done`; the download proxy
//! streams `/download` once the archive is ready.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use kcap_models::WorkerStatus;

use crate::config::CaptureConfig;

/// The boundary contract against a job's worker status endpoint.
#[async_trait]
pub trait WorkerApi: Send + Sync {
    /// Poll the worker once. Any transport or decode failure counts as a
    /// poll failure toward the relay's error threshold.
    async fn status(&self, job_name: &str) -> anyhow::Result<WorkerStatus>;

    /// Fetch the finished archive; `None` while it is not ready yet.
    async fn fetch_archive(&self, job_name: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// HTTP client for worker status endpoints.
pub struct WorkerClient {
    http: Client,
    port: u16,
}

impl WorkerClient {
    pub fn new(config: &CaptureConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.worker_timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("kcap-api/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            port: config.worker_port,
        })
    }

    fn base_url(&self, job_name: &str) -> String {
        format!("http://{}:{}", job_name, self.port)
    }
}

#[async_trait]
impl WorkerApi for WorkerClient {
    async fn status(&self, job_name: &str) -> anyhow::Result<WorkerStatus> {
        let url = format!("{}/done", self.base_url(job_name));
        debug!(%url, "Polling worker status");

        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn fetch_archive(&self, job_name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let url = format!("{}/download", self.base_url(job_name));

        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.bytes().await?.to_vec()))
    }
}
