//! Rate-limited, back-pressured load generation with CPU offload
//!
//! This crate drives synthetic load against an HTTP endpoint through a small
//! pipeline of cooperating tasks:
//!
//! 1. **Producer**: admits work items under a token bucket and a queue-depth limit
//! 2. **Consumers**: pull items from a bounded queue, call the target, then hand the
//!    CPU-bound part of the work to a fixed pool of OS threads
//! 3. **Stats reporter**: samples and resets per-second counters
//!
//! # Features
//! - Lazy-refill token bucket that allows bursts up to its capacity
//! - Bounded MPMC queue with `task_done` / `join` accounting
//! - Worker pool that can be awaited from async code and joins in-flight work on shutdown
//! - Any `tower::Service<WorkItem>` can act as the target; [`pipeline::HttpTarget`] uses reqwest
//!
//! # Basic Usage
//! ```no_run
//! use tps_pipeline::pipeline::{HttpTarget, Pipeline, PipelineSettings, SimulatedWorkload};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), tps_pipeline::Error> {
//! let settings = PipelineSettings::builder()
//!     .rate_limit(60)
//!     .consumers(4)
//!     .build();
//! let target = HttpTarget::new(settings.endpoint(), settings.request_timeout())?;
//! let workload = SimulatedWorkload::new(Duration::from_millis(200));
//!
//! let report = Pipeline::new(settings).run(target, workload).await?;
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```
//!
//! # Metrics
//! Emits counters, gauges and histograms through the `metrics` facade, see
//! [`pipeline::internal_event`].
pub mod pipeline;
#[cfg(test)]
pub(crate) mod test_utils;

#[macro_use]
extern crate tracing;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
