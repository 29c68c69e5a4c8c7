use std::{fmt::Write as _, sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use tokio::{task::JoinHandle, time::Instant};
use tower::Service;

use super::{
    BoundedQueue, Consumer, FailureDetail, MetricsMonitor, PipelineSettings, ResultTracker,
    ShutdownSignal, StatsReporter, StatsSummary, TokenBucket, WorkItem, WorkerPool, Workload,
    produce,
};

/// Failed samples kept in a [`RunReport`].
pub const FAILED_SAMPLE_LIMIT: usize = 5;

/// Errors that prevent a run from starting or finishing.
///
/// Per-item failures never surface here; they are counted in the [`RunReport`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("Invalid pipeline settings: {}", reason))]
    InvalidSettings { reason: String },

    #[snafu(display("Failed to start worker pool: {}", source))]
    SpawnWorker { source: std::io::Error },

    #[snafu(display("Failed to build HTTP client: {}", source))]
    BuildClient { source: reqwest::Error },

    #[snafu(display("Pipeline task failed: {}", source))]
    Join { source: tokio::task::JoinError },
}

/// Outcome of one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub produced: u64,
    pub success: u64,
    pub failure: u64,
    pub failed_samples: Vec<(u64, FailureDetail)>,
    pub elapsed: Duration,
    pub stats: StatsSummary,
}

impl RunReport {
    /// Every admitted item ended in exactly one terminal state.
    pub fn is_balanced(&self) -> bool {
        self.success + self.failure == self.produced
    }

    pub fn render(&self) -> String {
        let mut out = format!("[Result] success={} failure={}", self.success, self.failure);
        if !self.failed_samples.is_empty() {
            let preview = self
                .failed_samples
                .iter()
                .map(|(item_id, detail)| format!("id={item_id} detail={detail}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(out, "\n[Result] failed samples: {preview}");
        }
        out
    }
}

/// Wires producer, consumers, worker pool and stats reporter together for one run.
#[derive(Clone, Debug)]
pub struct Pipeline {
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Admits `total_requests` items against `target` and waits until each one has
    /// been handled.
    ///
    /// Shutdown runs in two phases: once every admitted item is done the reporter
    /// is stopped and flushes a final tick, then the consumers are stopped and the
    /// worker pool is joined on a blocking thread.
    ///
    /// With zero consumers nothing drains the queue and this never returns; callers
    /// that allow that configuration should bound the run with a timeout.
    pub async fn run<S, W>(&self, target: S, workload: W) -> Result<RunReport, PipelineError>
    where
        S: Service<WorkItem, Response = Value> + Clone + Send + 'static,
        S::Error: Into<crate::Error> + Send,
        S::Future: Send,
        W: Workload,
    {
        let settings = &self.settings;
        settings.validate()?;
        let started = Instant::now();

        let bucket = TokenBucket::new(settings.bucket_capacity(), settings.fill_rate());
        let queue = Arc::new(BoundedQueue::new(settings.queue_size()));
        let tracker = Arc::new(ResultTracker::new());
        let monitor = Arc::new(MetricsMonitor::new());
        let pool = Arc::new(WorkerPool::new(settings.workers()).context(SpawnWorkerSnafu)?);
        let workload = Arc::new(workload);

        let stop_reporter = ShutdownSignal::new();
        let stop_consumers = ShutdownSignal::new();

        info!("{}", settings.banner());

        let reporter = tokio::spawn(
            StatsReporter::new(
                Arc::clone(&monitor),
                Arc::clone(&queue),
                settings.stats_interval(),
            )
            .run(stop_reporter.subscribe()),
        );

        let consumers: Vec<JoinHandle<u64>> = (0..settings.consumers())
            .map(|id| {
                let consumer = Consumer::builder()
                    .id(id)
                    .target(target.clone())
                    .queue(Arc::clone(&queue))
                    .pool(Arc::clone(&pool))
                    .workload(Arc::clone(&workload))
                    .tracker(Arc::clone(&tracker))
                    .monitor(Arc::clone(&monitor))
                    .build();
                tokio::spawn(consumer.run(stop_consumers.subscribe()))
            })
            .collect();

        let produced = produce(
            &bucket,
            &queue,
            settings.total_requests(),
            settings.queue_size(),
            settings.poll_interval(),
        )
        .await;

        queue.join().await;
        debug!(message = "All admitted items handled.", produced);

        stop_reporter.trigger();
        let stats = match reporter.await {
            Ok(summary) => summary,
            Err(error) if error.is_cancelled() => StatsSummary::default(),
            Err(error) => return Err(error).context(JoinSnafu),
        };

        stop_consumers.trigger();
        queue.close();
        for handle in consumers {
            match handle.await {
                Ok(handled) => trace!(message = "Consumer joined.", handled),
                Err(error) if error.is_cancelled() => {}
                Err(error) => return Err(error).context(JoinSnafu),
            }
        }

        match Arc::into_inner(pool) {
            Some(pool) => tokio::task::spawn_blocking(move || pool.shutdown())
                .await
                .context(JoinSnafu)?,
            // Unreachable once every consumer is joined; the last drop still joins the threads.
            None => warn!(message = "Worker pool still shared at shutdown."),
        }

        let report = RunReport {
            produced,
            success: tracker.success(),
            failure: tracker.failure(),
            failed_samples: tracker.failed_samples(FAILED_SAMPLE_LIMIT),
            elapsed: started.elapsed(),
            stats,
        };
        info!(
            message = "Run finished.",
            produced = report.produced,
            success = report.success,
            failure = report.failure,
            elapsed_ms = report.elapsed.as_millis() as u64,
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tower::service_fn;

    use super::*;
    use crate::test_utils::trace_init;
    use crate::pipeline::{HttpError, SimulatedWorkload};

    fn echo()
    -> impl Service<WorkItem, Response = Value, Error = HttpError, Future: Send> + Clone {
        service_fn(|item: WorkItem| async move {
            Ok::<_, HttpError>(json!({"item_id": item.item_id}))
        })
    }

    fn report(failed_samples: Vec<(u64, FailureDetail)>) -> RunReport {
        RunReport {
            produced: 3,
            success: 3 - failed_samples.len() as u64,
            failure: failed_samples.len() as u64,
            failed_samples,
            elapsed: Duration::from_millis(10),
            stats: StatsSummary::default(),
        }
    }

    #[test]
    fn render_without_failures() {
        assert_eq!(report(vec![]).render(), "[Result] success=3 failure=0");
    }

    #[test]
    fn render_lists_failed_samples() {
        let rendered = report(vec![
            (
                1,
                FailureDetail::Http {
                    status_code: 503,
                    body: "busy".to_string(),
                },
            ),
            (
                2,
                FailureDetail::Transport {
                    error: "refused".to_string(),
                },
            ),
        ])
        .render();

        assert_eq!(
            rendered,
            "[Result] success=1 failure=2\n[Result] failed samples: \
             id=1 detail={\"kind\":\"http\",\"status_code\":503,\"body\":\"busy\"}, \
             id=2 detail={\"kind\":\"transport\",\"error\":\"refused\"}"
        );
    }

    #[tokio::test]
    async fn invalid_settings_fail_before_starting() {
        let pipeline = Pipeline::new(PipelineSettings::builder().workers(0).build());
        let error = pipeline
            .run(echo(), SimulatedWorkload::new(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(error, PipelineError::InvalidSettings { .. }));
    }

    #[tokio::test]
    async fn run_accounts_for_every_item() {
        trace_init();
        let settings = PipelineSettings::builder()
            .workers(2)
            .consumers(3)
            .rate_limit(1000)
            .queue_size(8)
            .total_requests(40)
            .work_time(Duration::ZERO)
            .build();

        let report = Pipeline::new(settings)
            .run(echo(), SimulatedWorkload::new(Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(report.produced, 40);
        assert_eq!(report.success, 40);
        assert!(report.is_balanced());
        assert!(report.stats.ticks >= 1);
        assert_eq!(report.stats.total_requests, 40);
        assert_eq!(report.stats.total_processed, 40);
        assert!(report.stats.max_queue_depth <= 8);
    }
}
