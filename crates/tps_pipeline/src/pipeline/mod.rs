//! Admission, transport, consumption and reporting for one load-generation run.

mod consumer;
mod monitor;
mod orchestrator;
mod producer;
mod queue;
mod shutdown;
mod token_bucket;
mod tracker;
mod worker_pool;
mod workload;

pub mod http;
pub mod internal_event;
pub mod reqwest_integration;
pub mod settings;
pub mod stats;

use serde::{Deserialize, Serialize};

pub use consumer::Consumer;
pub use http::HttpError;
pub use monitor::MetricsMonitor;
pub use orchestrator::{Pipeline, PipelineError, RunReport};
pub use producer::produce;
pub use queue::BoundedQueue;
pub use reqwest_integration::HttpTarget;
pub use settings::PipelineSettings;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use stats::{StatsReporter, StatsSummary};
pub use token_bucket::TokenBucket;
pub use tracker::{FailureDetail, ResultTracker};
pub use worker_pool::{JobHandle, WorkerError, WorkerPool};
pub use workload::{ProcessedItem, SimulatedWorkload, Workload, WorkloadError};

fn instant_now() -> std::time::Instant {
    tokio::time::Instant::now().into()
}

/// One unit of synthetic load.
///
/// `item_id` is the 0-based admission index assigned by the producer, `payload`
/// an opaque token that is unique per run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub item_id: u64,
    pub payload: String,
}

impl WorkItem {
    pub fn new(item_id: u64) -> Self {
        Self {
            item_id,
            payload: uuid::Uuid::new_v4().to_string(),
        }
    }
}
