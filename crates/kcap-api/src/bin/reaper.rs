//! One-shot reclamation sweep, for cron-style scheduling.
//!
//! Runs a single sweep of aged jobs, pods, and archive objects, prints the
//! outcome, and exits. The in-process loop inside `kcap-api` covers
//! deployments without an external scheduler.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kcap_api::{CaptureConfig, Reaper};
use kcap_cluster::KubeClient;
use kcap_storage::S3Storage;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(EnvFilter::from_default_env().add_directive("kcap=info".parse().unwrap()))
        .init();

    let config = CaptureConfig::from_env();
    info!("Sweeping jobs older than {:?}", config.retention);

    let cluster = match KubeClient::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create cluster client: {}", e);
            std::process::exit(1);
        }
    };
    let storage = match S3Storage::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let reaper = Reaper::new(&config, cluster, storage);
    match reaper.sweep_once().await {
        Ok(stats) => {
            info!(
                "Done: {} jobs deleted, {} pods deleted, {} storage failures",
                stats.jobs_deleted, stats.pods_deleted, stats.storage_failures
            );
        }
        Err(e) => {
            error!("Sweep failed: {}", e);
            std::process::exit(1);
        }
    }
}
