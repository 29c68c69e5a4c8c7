use std::{
    sync::{Mutex, PoisonError},
    time::Instant,
};

use super::instant_now;

/// Admission gate for new work items.
///
/// Tokens refill lazily at `fill_rate` per second, computed on each call rather than
/// by a timer, and never accumulate beyond `capacity`. The bucket starts full, so up
/// to `capacity` items may be admitted as an initial burst.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    fill_rate: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// # Panics
    /// If `capacity` is zero or `fill_rate` is not a positive finite number.
    pub fn new(capacity: u32, fill_rate: f64) -> Self {
        assert!(capacity >= 1, "token bucket capacity must be at least 1");
        assert!(
            fill_rate.is_finite() && fill_rate > 0.0,
            "token bucket fill rate must be positive, got {fill_rate}"
        );

        Self {
            capacity,
            fill_rate,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: instant_now(),
            }),
        }
    }

    /// Takes one token if available. Never blocks on time, only on the state lock.
    pub fn take(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after applying any pending refill.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn fill_rate(&self) -> f64 {
        self.fill_rate
    }

    fn refill(&self, state: &mut BucketState) {
        let now = instant_now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed.is_zero() {
            return;
        }

        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.fill_rate).min(f64::from(self.capacity));
        state.last_refill = now;
    }
}
