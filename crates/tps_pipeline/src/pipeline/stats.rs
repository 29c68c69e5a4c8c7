use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use super::{
    BoundedQueue, MetricsMonitor, Shutdown,
    internal_event::{StatsTick, StatsTickData},
};

/// Totals accumulated by a [`StatsReporter`] over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub ticks: u64,
    pub total_requests: u64,
    pub total_processed: u64,
    pub max_queue_depth: usize,
}

impl StatsSummary {
    fn absorb(&mut self, tick: StatsTickData) {
        self.ticks += 1;
        self.total_requests += tick.requests;
        self.total_processed += tick.processed;
        self.max_queue_depth = self.max_queue_depth.max(tick.queue_depth);
    }
}

/// Samples and resets the per-interval counters, reporting throughput and queue depth.
#[derive(Debug)]
pub struct StatsReporter<T> {
    monitor: Arc<MetricsMonitor>,
    queue: Arc<BoundedQueue<T>>,
    interval: Duration,
}

impl<T> StatsReporter<T> {
    pub fn new(
        monitor: Arc<MetricsMonitor>,
        queue: Arc<BoundedQueue<T>>,
        interval: Duration,
    ) -> Self {
        Self {
            monitor,
            queue,
            interval,
        }
    }

    /// Reports every `interval` until `stop` fires, then reports once more so
    /// counts from the last partial interval are not lost.
    pub async fn run(self, mut stop: Shutdown) -> StatsSummary {
        let event = StatsTick::register();
        let mut summary = StatsSummary::default();

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => summary.absorb(self.tick(&event)),
                _ = stop.triggered() => {
                    summary.absorb(self.tick(&event));
                    break;
                }
            }
        }

        debug!(message = "Stats reporter stopped.", ticks = summary.ticks);
        summary
    }

    fn tick(&self, event: &StatsTick) -> StatsTickData {
        let (requests, processed) = self.monitor.reset_counts();
        let data = StatsTickData {
            requests,
            processed,
            queue_depth: self.queue.len(),
        };
        event.emit(data);
        data
    }
}
