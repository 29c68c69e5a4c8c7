use metrics::{Counter, Gauge, Histogram, counter, gauge, histogram};

use crate::pipeline::FailureDetail;
use crate::registered_event;

registered_event! {
    ItemAdmitted => {
        admitted: Counter = counter!("pipeline_items_admitted_total"),
    }

    fn emit(&self, item_id: u64) {
        self.admitted.increment(1);
        trace!(target: "tps_pipeline::producer", item_id, "Item admitted.");
    }
}

registered_event! {
    TargetRequest => {
        requests: Counter = counter!("pipeline_requests_total"),
    }

    fn emit(&self, item_id: u64) {
        self.requests.increment(1);
        trace!(target: "tps_pipeline::consumer", item_id, "Target called.");
    }
}

registered_event! {
    ItemProcessed => {
        processed: Counter = counter!("pipeline_processed_total"),
    }

    fn emit(&self, item_id: u64) {
        self.processed.increment(1);
        trace!(target: "tps_pipeline::consumer", item_id, "Item processed.");
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FailedItem<'a> {
    pub item_id: u64,
    pub detail: &'a FailureDetail,
}

registered_event! {
    ItemFailed => {
        http: Counter = counter!("pipeline_failures_total", "kind" => "http"),
        transport: Counter = counter!("pipeline_failures_total", "kind" => "transport"),
        worker: Counter = counter!("pipeline_failures_total", "kind" => "worker"),
    }

    fn emit(&self, data: FailedItem<'_>) {
        let counter = match data.detail {
            FailureDetail::Http { .. } => &self.http,
            FailureDetail::Transport { .. } => &self.transport,
            FailureDetail::Worker { .. } => &self.worker,
        };
        counter.increment(1);
        warn!(
            target: "tps_pipeline::consumer",
            item_id = data.item_id,
            kind = data.detail.kind(),
            detail = %data.detail,
            "Item failed."
        );
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsTickData {
    pub requests: u64,
    pub processed: u64,
    pub queue_depth: usize,
}

registered_event! {
    StatsTick => {
        // Histograms keep every per-tick value rather than the last one.
        requests_per_tick: Histogram = histogram!("pipeline_stats_requests_per_tick"),
        processed_per_tick: Histogram = histogram!("pipeline_stats_processed_per_tick"),
        queue_depth: Gauge = gauge!("pipeline_queue_depth"),
    }

    fn emit(&self, data: StatsTickData) {
        self.requests_per_tick.record(data.requests as f64);
        self.processed_per_tick.record(data.processed as f64);
        self.queue_depth.set(data.queue_depth as f64);

        info!(
            target: "tps_pipeline::stats",
            requests = data.requests,
            processed = data.processed,
            queue_depth = data.queue_depth,
            "[Stats] requests/s: {} | processed/s: {} | queue depth: {}",
            data.requests,
            data.processed,
            data.queue_depth,
        );
    }
}

#[cfg(test)]
mod tests {
    use metrics_util::{
        CompositeKey, MetricKind,
        debugging::{DebugValue, DebuggingRecorder},
    };

    use super::*;

    fn snapshot_of(f: impl FnOnce()) -> Vec<(CompositeKey, DebugValue)> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        metrics::with_local_recorder(&recorder, f);
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _unit, _description, value)| (key, value))
            .collect()
    }

    fn counter_value(
        snapshot: &[(CompositeKey, DebugValue)],
        name: &str,
        kind: Option<&str>,
    ) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
            .filter(|(key, _)| match kind {
                Some(kind) => key
                    .key()
                    .labels()
                    .any(|label| label.key() == "kind" && label.value() == kind),
                None => true,
            })
            .map(|(_, value)| match value {
                DebugValue::Counter(count) => *count,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn item_counters_increment() {
        let snapshot = snapshot_of(|| {
            let admitted = ItemAdmitted::register();
            let requests = TargetRequest::register();
            let processed = ItemProcessed::register();
            for id in 0..3 {
                admitted.emit(id);
                requests.emit(id);
            }
            processed.emit(0);
        });

        assert_eq!(counter_value(&snapshot, "pipeline_items_admitted_total", None), 3);
        assert_eq!(counter_value(&snapshot, "pipeline_requests_total", None), 3);
        assert_eq!(counter_value(&snapshot, "pipeline_processed_total", None), 1);
    }

    #[test]
    fn failures_are_labelled_by_kind() {
        let http = FailureDetail::Http {
            status_code: 503,
            body: "busy".to_string(),
        };
        let worker = FailureDetail::Worker {
            error: "panicked".to_string(),
        };

        let snapshot = snapshot_of(|| {
            let failed = ItemFailed::register();
            failed.emit(FailedItem { item_id: 1, detail: &http });
            failed.emit(FailedItem { item_id: 2, detail: &http });
            failed.emit(FailedItem { item_id: 3, detail: &worker });
        });

        assert_eq!(counter_value(&snapshot, "pipeline_failures_total", Some("http")), 2);
        assert_eq!(counter_value(&snapshot, "pipeline_failures_total", Some("worker")), 1);
        assert_eq!(counter_value(&snapshot, "pipeline_failures_total", Some("transport")), 0);
    }

    #[test]
    fn stats_tick_records_histograms_and_depth() {
        let snapshot = snapshot_of(|| {
            let tick = StatsTick::register();
            tick.emit(StatsTickData {
                requests: 10,
                processed: 8,
                queue_depth: 3,
            });
            tick.emit(StatsTickData {
                requests: 12,
                processed: 12,
                queue_depth: 0,
            });
        });

        let requests = snapshot
            .iter()
            .find(|(key, _)| key.key().name() == "pipeline_stats_requests_per_tick")
            .map(|(_, value)| value.clone());
        match requests {
            Some(DebugValue::Histogram(values)) => {
                let values: Vec<f64> = values.into_iter().map(|v| v.into_inner()).collect();
                assert_eq!(values, vec![10.0, 12.0]);
            }
            other => panic!("unexpected value: {other:?}"),
        }

        let depth = snapshot
            .iter()
            .find(|(key, _)| key.key().name() == "pipeline_queue_depth")
            .map(|(_, value)| value.clone());
        match depth {
            Some(DebugValue::Gauge(value)) => assert_eq!(value.into_inner(), 0.0),
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
