use std::{thread, time::Duration};

use serde::Serialize;
use serde_json::Value;
use snafu::Snafu;

use super::WorkItem;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WorkloadError {
    #[snafu(display("workload failed for item {}: {}", item_id, reason))]
    Failed { item_id: u64, reason: String },
}

/// Result of the CPU-bound step: the target's response joined with the worker's output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessedItem {
    pub item_id: u64,
    pub processed: bool,
    pub response: Value,
    pub worker_thread: bool,
}

/// CPU-bound step run on the worker pool after a successful target call.
///
/// Implementations run on a pool thread and may block freely.
pub trait Workload: Send + Sync + 'static {
    fn run(&self, item: &WorkItem, response: Value) -> Result<ProcessedItem, WorkloadError>;
}

impl<F> Workload for F
where
    F: Fn(&WorkItem, Value) -> Result<ProcessedItem, WorkloadError> + Send + Sync + 'static,
{
    fn run(&self, item: &WorkItem, response: Value) -> Result<ProcessedItem, WorkloadError> {
        self(item, response)
    }
}

/// Stands in for real CPU work by occupying the calling thread for `work_time`.
#[derive(Clone, Copy, Debug)]
pub struct SimulatedWorkload {
    work_time: Duration,
}

impl SimulatedWorkload {
    pub const fn new(work_time: Duration) -> Self {
        Self { work_time }
    }

    pub const fn work_time(&self) -> Duration {
        self.work_time
    }
}

impl Workload for SimulatedWorkload {
    fn run(&self, item: &WorkItem, response: Value) -> Result<ProcessedItem, WorkloadError> {
        if !self.work_time.is_zero() {
            thread::sleep(self.work_time);
        }

        Ok(ProcessedItem {
            item_id: item.item_id,
            processed: true,
            response,
            worker_thread: thread::current()
                .name()
                .is_some_and(|name| name.starts_with("tps-worker-")),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;

    use super::*;

    #[test]
    fn simulated_workload_takes_work_time_and_echoes_response() {
        let workload = SimulatedWorkload::new(Duration::from_millis(30));
        let item = WorkItem {
            item_id: 4,
            payload: "p".to_string(),
        };

        let started = Instant::now();
        let processed = workload.run(&item, json!({"ok": true})).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(processed.item_id, 4);
        assert!(processed.processed);
        assert_eq!(processed.response, json!({"ok": true}));
        // Not on a pool thread in this test.
        assert!(!processed.worker_thread);
    }

    #[test]
    fn closures_are_workloads() {
        let failing = |item: &WorkItem, _response: Value| -> Result<ProcessedItem, WorkloadError> {
            FailedSnafu {
                item_id: item.item_id,
                reason: "bad input",
            }
            .fail()
        };
        let item = WorkItem::new(9);

        let error = failing.run(&item, Value::Null).unwrap_err();
        assert_eq!(error.to_string(), "workload failed for item 9: bad input");
    }
}
