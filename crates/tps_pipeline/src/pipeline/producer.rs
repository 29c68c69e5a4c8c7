use std::time::Duration;

use tokio::time::sleep;

use super::{BoundedQueue, TokenBucket, WorkItem, internal_event::ItemAdmitted};

/// Admits `total` work items into `queue`, returning how many were admitted.
///
/// An item is admitted only when the queue holds fewer than `queue_limit` items and
/// the bucket grants a token, checked in that order so a full queue never burns
/// tokens. Either condition failing backs off for `poll_interval`. Ids are assigned
/// sequentially from 0 in admission order.
///
/// Stops early, with a warning, only if the queue is closed underneath it.
pub async fn produce(
    bucket: &TokenBucket,
    queue: &BoundedQueue<WorkItem>,
    total: u64,
    queue_limit: usize,
    poll_interval: Duration,
) -> u64 {
    let admitted = ItemAdmitted::register();
    let mut produced = 0;

    while produced < total {
        if queue.len() >= queue_limit {
            sleep(poll_interval).await;
            continue;
        }

        if !bucket.take() {
            sleep(poll_interval).await;
            continue;
        }

        let item = WorkItem::new(produced);
        if queue.put(item).await.is_err() {
            warn!(message = "Queue closed before all items were admitted.", produced, total);
            break;
        }
        admitted.emit(produced);
        produced += 1;
    }

    info!(produced, "[Producer] queued {} items", produced);
    produced
}
