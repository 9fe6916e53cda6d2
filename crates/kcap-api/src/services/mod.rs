//! Orchestration services.

pub mod builder;
pub mod orchestrator;
pub mod reaper;

pub use builder::JobSpecBuilder;
pub use orchestrator::{DeleteJobResponse, JobFilter, Orchestrator, StartJobResponse};
pub use reaper::{Reaper, SweepStats};
