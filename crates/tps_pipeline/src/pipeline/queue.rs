use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Bounded FIFO shared by one producer and many consumers.
///
/// Besides the channel itself the queue counts *unfinished* items: every `put`
/// increments the count and every `task_done` decrements it, so `join` can wait
/// until each admitted item has been fully handled, not merely dequeued.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    sender: async_channel::Sender<T>,
    receiver: async_channel::Receiver<T>,
    capacity: usize,
    unfinished: AtomicUsize,
    all_done: Notify,
}

impl<T> BoundedQueue<T> {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = async_channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            unfinished: AtomicUsize::new(0),
            all_done: Notify::new(),
        }
    }

    /// Enqueues `item`, waiting while the queue is full.
    ///
    /// Returns the item back if the queue has been closed.
    pub async fn put(&self, item: T) -> Result<(), T> {
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        self.sender.send(item).await.map_err(|rejected| {
            self.finish_one();
            rejected.into_inner()
        })
    }

    /// Dequeues the oldest item, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn get(&self) -> Option<T> {
        self.receiver.recv().await.ok()
    }

    /// Refuses further puts and wakes idle consumers once the backlog is drained.
    pub fn close(&self) -> bool {
        self.sender.close()
    }

    /// Marks one previously dequeued item as fully handled.
    pub fn task_done(&self) {
        self.finish_one();
    }

    /// Waits until every item ever put has been marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.all_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Number of items waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items put but not yet marked done, queued or in progress.
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }

    fn finish_one(&self) {
        let previous = self
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match previous {
            Ok(1) => self.all_done.notify_waiters(),
            Ok(_) => {}
            Err(_) => error!(message = "task_done called more times than items were put."),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = BoundedQueue::new(8);
        for i in 0..5 {
            queue.put(i).await.unwrap();
        }
        assert_eq!(queue.len(), 5);

        for i in 0..5 {
            assert_eq!(queue.get().await, Some(i));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn put_waits_while_full() {
        let queue = BoundedQueue::new(2);
        queue.put(1).await.unwrap();
        queue.put(2).await.unwrap();

        let mut put = task::spawn(queue.put(3));
        assert_pending!(put.poll());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.get().await, Some(1));
        assert!(put.is_woken());
        assert_ready!(put.poll()).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.unfinished(), 3);
    }

    #[tokio::test]
    async fn get_waits_while_empty() {
        let queue = BoundedQueue::<u32>::new(1);

        let mut get = task::spawn(queue.get());
        assert_pending!(get.poll());

        queue.put(9).await.unwrap();
        assert!(get.is_woken());
        assert_eq!(assert_ready!(get.poll()), Some(9));
    }

    #[tokio::test]
    async fn close_drains_backlog_then_ends() {
        let queue = BoundedQueue::new(4);
        queue.put(1).await.unwrap();
        assert!(queue.close());

        assert_eq!(queue.put(2).await, Err(2));
        assert_eq!(queue.unfinished(), 1);
        assert_eq!(queue.get().await, Some(1));
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn join_returns_immediately_when_nothing_was_put() {
        let queue = BoundedQueue::<u32>::new(1);
        let mut join = task::spawn(queue.join());
        assert_ready!(join.poll());
    }

    #[tokio::test]
    async fn join_waits_for_task_done_not_just_get() {
        let queue = BoundedQueue::new(4);
        queue.put("a").await.unwrap();
        queue.put("b").await.unwrap();

        let mut join = task::spawn(queue.join());
        assert_pending!(join.poll());

        queue.get().await;
        queue.get().await;
        assert_pending!(join.poll());

        queue.task_done();
        assert_pending!(join.poll());

        queue.task_done();
        assert!(join.is_woken());
        assert_ready!(join.poll());
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn extra_task_done_does_not_underflow() {
        let queue = BoundedQueue::<u8>::new(1);
        queue.task_done();
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn consumers_compete_for_items() {
        let queue = Arc::new(BoundedQueue::new(16));
        let total = 200u64;

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = queue.get().await {
                    seen.push(item);
                    queue.task_done();
                }
                seen
            }));
        }

        for i in 0..total {
            assert!(queue.len() <= queue.capacity());
            queue.put(i).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), queue.join())
            .await
            .expect("queue drained");

        queue.close();

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..total).collect::<Vec<_>>());
    }
}
