use std::sync::Arc;

use bon::Builder;
use serde_json::Value;
use tower::{Service, ServiceExt};

use super::{
    BoundedQueue, FailureDetail, HttpError, MetricsMonitor, ResultTracker, Shutdown, WorkItem,
    WorkerError, WorkerPool, Workload,
    internal_event::{FailedItem, ItemFailed, ItemProcessed, TargetRequest},
};

/// Pulls items off the queue, calls the target, then runs the workload on the pool.
///
/// Every dequeued item reaches exactly one of `record_success` or `record_failure`
/// on the tracker and is then marked done on the queue, whatever happened to it.
#[derive(Builder)]
pub struct Consumer<S, W> {
    #[builder(default)]
    id: usize,
    target: S,
    queue: Arc<BoundedQueue<WorkItem>>,
    pool: Arc<WorkerPool>,
    workload: Arc<W>,
    tracker: Arc<ResultTracker>,
    monitor: Arc<MetricsMonitor>,
}

struct Events {
    requests: TargetRequest,
    processed: ItemProcessed,
    failed: ItemFailed,
}

impl<S, W> Consumer<S, W>
where
    S: Service<WorkItem, Response = Value>,
    S::Error: Into<crate::Error>,
    W: Workload,
{
    /// Handles items until `shutdown` fires or the queue is closed and drained.
    ///
    /// Shutdown is only observed between items, so an item in progress is always
    /// recorded. Returns how many items this consumer handled.
    pub async fn run(mut self, mut shutdown: Shutdown) -> u64 {
        let events = Events {
            requests: TargetRequest::register(),
            processed: ItemProcessed::register(),
            failed: ItemFailed::register(),
        };
        let mut handled = 0;

        debug!(message = "Consumer started.", consumer = self.id);
        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                item = self.queue.get() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            self.handle(item, &events).await;
            self.queue.task_done();
            handled += 1;
        }
        debug!(message = "Consumer stopped.", consumer = self.id, handled);

        handled
    }

    async fn handle(&mut self, item: WorkItem, events: &Events) {
        let item_id = item.item_id;

        let response = match self.target.ready().await {
            Ok(target) => target.call(item.clone()).await,
            Err(error) => Err(error),
        };
        self.monitor.record_api_request();
        events.requests.emit(item_id);

        let body = match response {
            Ok(body) => body,
            Err(error) => {
                self.fail(item_id, failure_detail(error.into()), events);
                return;
            }
        };

        let workload = Arc::clone(&self.workload);
        let job = self.pool.submit(move || workload.run(&item, body));

        match job.await {
            Ok(Ok(processed)) => {
                trace!(
                    message = "Workload finished.",
                    consumer = self.id,
                    item_id,
                    worker_thread = processed.worker_thread
                );
                self.tracker.record_success(item_id);
                self.monitor.record_processed();
                events.processed.emit(item_id);
            }
            Ok(Err(source)) => {
                let error = WorkerError::Workload { source };
                self.fail(item_id, FailureDetail::from(&error), events);
            }
            Err(error) => self.fail(item_id, FailureDetail::from(&error), events),
        }
    }

    fn fail(&self, item_id: u64, detail: FailureDetail, events: &Events) {
        events.failed.emit(FailedItem {
            item_id,
            detail: &detail,
        });
        self.tracker.record_failure(item_id, detail);
    }
}

/// Target errors are boxed by tower middleware; recover the typed error when there is one.
fn failure_detail(error: crate::Error) -> FailureDetail {
    match error.downcast::<HttpError>() {
        Ok(http) => FailureDetail::from(&*http),
        Err(other) => FailureDetail::Transport {
            error: other.to_string(),
        },
    }
}
