//! Application state.

use std::sync::Arc;

use kcap_cluster::{ClusterApi, KubeClient};
use kcap_storage::{ObjectStore, S3Storage};

use crate::config::CaptureConfig;
use crate::security::UrlAllowList;
use crate::services::Orchestrator;
use crate::worker::{WorkerApi, WorkerClient};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CaptureConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub worker: Arc<dyn WorkerApi>,
    pub allow_list: Arc<UrlAllowList>,
}

impl AppState {
    /// Create application state from explicit collaborators.
    pub fn new(
        config: CaptureConfig,
        cluster: Arc<dyn ClusterApi>,
        storage: Arc<dyn ObjectStore>,
        worker: Arc<dyn WorkerApi>,
    ) -> anyhow::Result<Self> {
        let allow_list = UrlAllowList::new(&config.allowed_capture_patterns)?;
        let orchestrator = Orchestrator::new(&config, cluster, storage);

        Ok(Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            worker,
            allow_list: Arc::new(allow_list),
        })
    }

    /// Create application state with real clients from the environment.
    pub fn from_env(config: CaptureConfig) -> anyhow::Result<Self> {
        let cluster = Arc::new(KubeClient::from_env()?);
        let storage = Arc::new(S3Storage::from_env()?);
        let worker = Arc::new(WorkerClient::new(&config)?);
        Self::new(config, cluster, storage, worker)
    }
}
