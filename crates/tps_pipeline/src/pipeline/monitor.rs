use std::sync::{Mutex, PoisonError};

/// Per-interval counters sampled by the stats reporter.
///
/// Both counters live under one lock so that `reset_counts` reads and zeroes them
/// as a single step: an increment lands either before the reset (and is returned
/// by it) or after it (and is returned by the next one), never both or neither.
#[derive(Debug, Default)]
pub struct MetricsMonitor {
    counts: Mutex<Counts>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Counts {
    api_requests: u64,
    processed: u64,
}

impl MetricsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one outbound call, whatever its outcome.
    pub fn record_api_request(&self) {
        self.with_counts(|counts| counts.api_requests += 1);
    }

    /// Counts one item whose CPU-bound step completed successfully.
    pub fn record_processed(&self) {
        self.with_counts(|counts| counts.processed += 1);
    }

    /// Returns `(api_requests, processed)` without resetting.
    pub fn counts(&self) -> (u64, u64) {
        self.with_counts(|counts| (counts.api_requests, counts.processed))
    }

    /// Returns `(api_requests, processed)` and zeroes both counters.
    pub fn reset_counts(&self) -> (u64, u64) {
        self.with_counts(|counts| {
            let taken = std::mem::take(counts);
            (taken.api_requests, taken.processed)
        })
    }

    fn with_counts<R>(&self, f: impl FnOnce(&mut Counts) -> R) -> R {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut counts)
    }
}
