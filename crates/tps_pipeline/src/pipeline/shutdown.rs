use tokio::sync::watch;

/// Owning side of a one-way stop flag.
#[derive(Debug)]
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

/// Observing side of a [`ShutdownSignal`]; cheap to clone into each task.
#[derive(Clone, Debug)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal is triggered. A dropped signal counts as triggered.
    pub async fn triggered(&mut self) {
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[tokio::test]
    async fn trigger_wakes_every_subscriber() {
        let signal = ShutdownSignal::new();
        let mut first = signal.subscribe();
        let mut second = first.clone();

        let mut a = task::spawn(async move { first.triggered().await });
        let mut b = task::spawn(async move { second.triggered().await });
        assert_pending!(a.poll());
        assert_pending!(b.poll());

        signal.trigger();
        assert!(signal.is_triggered());
        assert!(a.is_woken());
        assert_ready!(a.poll());
        assert_ready!(b.poll());
    }

    #[tokio::test]
    async fn late_subscribers_observe_the_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        let mut shutdown = signal.subscribe();
        assert!(shutdown.is_triggered());
        shutdown.triggered().await;
    }

    #[tokio::test]
    async fn dropped_signal_counts_as_triggered() {
        let signal = ShutdownSignal::new();
        let mut shutdown = signal.subscribe();
        drop(signal);

        let mut waiting = task::spawn(async move { shutdown.triggered().await });
        assert_ready!(waiting.poll());
    }
}
