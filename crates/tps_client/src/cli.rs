use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tps_pipeline::pipeline::{
    PipelineSettings,
    settings::{DEFAULT_ENDPOINT, DEFAULT_TOTAL_REQUESTS},
};

/// Drive rate-limited load against an HTTP endpoint and report throughput.
///
/// Every flag can also be set through its environment variable or a `.env` file.
#[derive(Clone, Debug, Parser)]
#[command(name = "tps-client", version, about)]
pub struct Args {
    /// OS threads in the CPU worker pool.
    #[arg(long, env = "TPS_WORKERS", default_value_t = 8)]
    pub workers: usize,

    /// Concurrent consumer tasks.
    #[arg(long, env = "TPS_CONSUMERS", default_value_t = 4)]
    pub consumers: usize,

    /// Simulated CPU work per item, in seconds.
    #[arg(long, env = "TPS_WORK_TIME", default_value = "0.2", value_parser = parse_seconds)]
    pub work_time: Duration,

    /// Items admitted per second, also the burst size.
    #[arg(long, env = "TPS_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: u32,

    /// Queue capacity and producer depth limit.
    #[arg(long, env = "TPS_QUEUE_SIZE", default_value_t = 200)]
    pub queue_size: usize,

    /// Target URL receiving `POST` requests.
    #[arg(long, env = "TPS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Producer back-off when the queue is full or the bucket is empty, in milliseconds.
    #[arg(long, env = "TPS_POLL_INTERVAL_MS", default_value_t = 10)]
    pub poll_interval_ms: u64,

    /// Also write logs to this file, rotated daily.
    #[arg(long, env = "TPS_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings::builder()
            .workers(self.workers)
            .consumers(self.consumers)
            .work_time(self.work_time)
            .rate_limit(self.rate_limit)
            .queue_size(self.queue_size)
            .total_requests(DEFAULT_TOTAL_REQUESTS)
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .endpoint(self.endpoint.clone())
            .build()
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|error| format!("'{value}' is not a number of seconds: {error}"))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|error| format!("invalid duration '{value}': {error}"))
}
