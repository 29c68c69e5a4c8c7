use std::time::Duration;

use bon::Builder;
use snafu::ensure;

use super::orchestrator::{InvalidSettingsSnafu, PipelineError};

/// Items admitted per run unless overridden.
pub const DEFAULT_TOTAL_REQUESTS: u64 = 500;

/// Target endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/work";

/// Configuration of one load-generation run.
///
/// All fields are private; build values through [`PipelineSettings::builder`], which
/// falls back to the defaults below for anything left unset.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `workers` | 8 | OS threads in the CPU worker pool |
/// | `consumers` | 4 | Concurrent consumer tasks pulling from the queue<br>Zero is accepted but the run can never finish |
/// | `work_time` | 200 ms | Duration of the simulated CPU-bound step |
/// | `rate_limit` | 60 | Steady-state admissions per second (token fill rate) |
/// | `bucket_capacity` | `rate_limit` | Largest admission burst |
/// | `queue_size` | 200 | Queue capacity, also the producer's depth limit |
/// | `total_requests` | 500 | Items admitted before the run drains and stops |
/// | `poll_interval` | 10 ms | Producer back-off when the queue is full or no token is available |
/// | `stats_interval` | 1 s | Stats reporter cadence |
/// | `endpoint` | `http://127.0.0.1:8000/work` | Target URL for [`HttpTarget`](super::HttpTarget) |
/// | `request_timeout` | 1 s | Per-request timeout for [`HttpTarget`](super::HttpTarget) |
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tps_pipeline::pipeline::PipelineSettings;
///
/// let settings = PipelineSettings::builder()
///     .rate_limit(120)
///     .bucket_capacity(10)
///     .work_time(Duration::from_millis(50))
///     .build();
/// assert_eq!(settings.bucket_capacity(), 10);
/// ```
#[derive(Clone, Debug, Builder)]
pub struct PipelineSettings {
    #[builder(default = 8)]
    workers: usize,

    #[builder(default = 4)]
    consumers: usize,

    #[builder(default = Duration::from_millis(200))]
    work_time: Duration,

    #[builder(default = 60)]
    rate_limit: u32,

    /// Falls back to `rate_limit` when unset.
    bucket_capacity: Option<u32>,

    #[builder(default = 200)]
    queue_size: usize,

    #[builder(default = DEFAULT_TOTAL_REQUESTS)]
    total_requests: u64,

    #[builder(default = Duration::from_millis(10))]
    poll_interval: Duration,

    #[builder(default = Duration::from_secs(1))]
    stats_interval: Duration,

    #[builder(default = DEFAULT_ENDPOINT.to_string(), into)]
    endpoint: String,

    #[builder(default = Duration::from_secs(1))]
    request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineSettings {
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn consumers(&self) -> usize {
        self.consumers
    }

    pub fn work_time(&self) -> Duration {
        self.work_time
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn fill_rate(&self) -> f64 {
        f64::from(self.rate_limit)
    }

    pub fn bucket_capacity(&self) -> u32 {
        self.bucket_capacity.unwrap_or(self.rate_limit)
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn stats_interval(&self) -> Duration {
        self.stats_interval
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Rejects values that would make the pipeline unable to start.
    pub fn validate(&self) -> Result<(), PipelineError> {
        ensure!(
            self.workers >= 1,
            InvalidSettingsSnafu {
                reason: "workers must be at least 1"
            }
        );
        ensure!(
            self.rate_limit >= 1,
            InvalidSettingsSnafu {
                reason: "rate_limit must be at least 1 per second"
            }
        );
        ensure!(
            self.bucket_capacity() >= 1,
            InvalidSettingsSnafu {
                reason: "bucket_capacity must be at least 1"
            }
        );
        ensure!(
            self.queue_size >= 1,
            InvalidSettingsSnafu {
                reason: "queue_size must be at least 1"
            }
        );
        ensure!(
            !self.poll_interval.is_zero(),
            InvalidSettingsSnafu {
                reason: "poll_interval must be non-zero"
            }
        );
        ensure!(
            !self.stats_interval.is_zero(),
            InvalidSettingsSnafu {
                reason: "stats_interval must be non-zero"
            }
        );
        Ok(())
    }

    /// One-line summary printed when a run starts.
    pub fn banner(&self) -> String {
        format!(
            "[Main] settings: workers={}, consumers={}, work_time={}s, rate_limit={}/s, bucket_capacity={}, queue_size={}",
            self.workers,
            self.consumers,
            self.work_time.as_secs_f64(),
            self.rate_limit,
            self.bucket_capacity(),
            self.queue_size,
        )
    }
}
