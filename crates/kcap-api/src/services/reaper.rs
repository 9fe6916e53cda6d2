//! Background reclamation of aged capture jobs.
//!
//! Sweeps the working namespace for succeeded jobs older than the retention
//! window, deleting their archive object and then the job itself, and
//! separately sweeps succeeded pods that outlived their owning job record.
//! Runs from an in-process interval loop or one shot from the `kcap-reaper`
//! binary; either way only one sweep is in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use kcap_cluster::ClusterApi;
use kcap_models::decode_annotation;
use kcap_storage::ObjectStore;

use crate::config::CaptureConfig;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub jobs_deleted: u32,
    pub pods_deleted: u32,
    pub storage_failures: u32,
}

/// Periodic reclamation sweep over jobs, pods, and archive objects.
pub struct Reaper {
    cluster: Arc<dyn ClusterApi>,
    storage: Arc<dyn ObjectStore>,
    retention: Duration,
    reap_interval: Duration,
    enabled: bool,
    sweep_lock: Mutex<()>,
}

impl Reaper {
    pub fn new(
        config: &CaptureConfig,
        cluster: Arc<dyn ClusterApi>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            cluster,
            storage,
            retention: config.retention,
            reap_interval: config.reap_interval,
            enabled: config.reaper_enabled,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Run the sweep loop indefinitely; spawn as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Reaper is disabled");
            return;
        }

        info!(
            "Starting reaper (interval: {:?}, retention: {:?})",
            self.reap_interval, self.retention
        );

        let mut ticker = interval(self.reap_interval);
        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(stats) if stats.jobs_deleted > 0 || stats.pods_deleted > 0 => {
                    info!(
                        "Sweep complete: {} jobs, {} pods deleted",
                        stats.jobs_deleted, stats.pods_deleted
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Reaper sweep error: {}", e),
            }
        }
    }

    /// Run a single sweep. One poisoned entry never blocks the rest.
    pub async fn sweep_once(&self) -> anyhow::Result<SweepStats> {
        let _guard = self.sweep_lock.lock().await;

        let mut stats = SweepStats::default();
        self.sweep_jobs(&mut stats).await?;
        self.sweep_pods(&mut stats).await?;
        Ok(stats)
    }

    async fn sweep_jobs(&self, stats: &mut SweepStats) -> anyhow::Result<()> {
        let now = Utc::now();
        let jobs = self.cluster.list_jobs("").await?;

        for job in jobs {
            if !job.is_succeeded() {
                continue;
            }
            let Some(start_time) = job.status.start_time else {
                continue;
            };
            let age = (now - start_time).to_std().unwrap_or_default();
            if age < self.retention {
                debug!(job = %job.metadata.name, "Keeping job, not old enough");
                continue;
            }

            // Archive first, job second: the annotation is the only pointer
            // to the object, so it must still be readable if the delete has
            // to be retried.
            if let Some(storage_url) = job.annotation("storageUrl") {
                let storage_url = decode_annotation(storage_url);
                if let Err(e) = self.storage.delete_object(&storage_url).await {
                    stats.storage_failures += 1;
                    warn!(job = %job.metadata.name, error = %e, "Failed to delete archive object");
                }
            }

            match self.cluster.delete_job(&job.metadata.name).await {
                Ok(()) => {
                    info!(job = %job.metadata.name, "Reaped aged job");
                    stats.jobs_deleted += 1;
                }
                Err(e) => {
                    warn!(job = %job.metadata.name, error = %e, "Failed to delete aged job");
                }
            }
        }
        Ok(())
    }

    async fn sweep_pods(&self, stats: &mut SweepStats) -> anyhow::Result<()> {
        let now = Utc::now();
        let pods = self.cluster.list_succeeded_pods().await?;

        for pod in pods {
            let Some(start_time) = pod.status.start_time else {
                continue;
            };
            let age = (now - start_time).to_std().unwrap_or_default();
            if age < self.retention {
                debug!(pod = %pod.metadata.name, "Keeping pod, not old enough");
                continue;
            }

            match self.cluster.delete_pod(&pod.metadata.name).await {
                Ok(()) => {
                    info!(pod = %pod.metadata.name, "Reaped aged pod");
                    stats.pods_deleted += 1;
                }
                Err(e) => {
                    warn!(pod = %pod.metadata.name, error = %e, "Failed to delete aged pod");
                }
            }
        }
        Ok(())
    }
}
