use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use serde::Serialize;

use super::{HttpError, WorkerError};

/// Why an item did not reach a successful terminal state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDetail {
    /// The target answered with a non-200 status.
    Http { status_code: u16, body: String },
    /// The call failed without a usable response.
    Transport { error: String },
    /// The CPU-bound step returned an error or panicked.
    Worker { error: String },
}

impl FailureDetail {
    pub const fn kind(&self) -> &'static str {
        match self {
            FailureDetail::Http { .. } => "http",
            FailureDetail::Transport { .. } => "transport",
            FailureDetail::Worker { .. } => "worker",
        }
    }
}

impl From<&HttpError> for FailureDetail {
    fn from(error: &HttpError) -> Self {
        match error {
            HttpError::ServerError { status, body } => FailureDetail::Http {
                status_code: *status,
                body: body.clone(),
            },
            other => FailureDetail::Transport {
                error: other.to_string(),
            },
        }
    }
}

impl From<&WorkerError> for FailureDetail {
    fn from(error: &WorkerError) -> Self {
        FailureDetail::Worker {
            error: error.to_string(),
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// Terminal outcome of every admitted item.
///
/// Exactly one `record_*` call is expected per item, so at the end of a run
/// `success + failure` equals the number of items admitted.
#[derive(Debug, Default)]
pub struct ResultTracker {
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    success: u64,
    failure: u64,
    failed_items: Vec<(u64, FailureDetail)>,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, item_id: u64) {
        self.with_state(|state| state.success += 1);
        trace!(message = "Item succeeded.", item_id);
    }

    pub fn record_failure(&self, item_id: u64, detail: FailureDetail) {
        self.with_state(|state| {
            state.failure += 1;
            state.failed_items.push((item_id, detail));
        });
    }

    pub fn success(&self) -> u64 {
        self.with_state(|state| state.success)
    }

    pub fn failure(&self) -> u64 {
        self.with_state(|state| state.failure)
    }

    /// Failures in the order they were recorded, at most `limit` of them.
    pub fn failed_samples(&self, limit: usize) -> Vec<(u64, FailureDetail)> {
        self.with_state(|state| state.failed_items.iter().take(limit).cloned().collect())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut TrackerState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_outcomes_and_keeps_failure_order() {
        let tracker = ResultTracker::new();
        tracker.record_success(0);
        tracker.record_failure(
            1,
            FailureDetail::Http {
                status_code: 503,
                body: "busy".to_string(),
            },
        );
        tracker.record_success(2);
        tracker.record_failure(
            3,
            FailureDetail::Worker {
                error: "boom".to_string(),
            },
        );

        assert_eq!(tracker.success(), 2);
        assert_eq!(tracker.failure(), 2);

        let samples = tracker.failed_samples(5);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].0, 1);
        assert_eq!(samples[1].0, 3);
    }

    #[test]
    fn samples_are_capped() {
        let tracker = ResultTracker::new();
        for id in 0..12 {
            tracker.record_failure(
                id,
                FailureDetail::Transport {
                    error: "refused".to_string(),
                },
            );
        }

        let ids: Vec<u64> = tracker.failed_samples(5).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(tracker.failure(), 12);
    }

    #[test]
    fn http_errors_map_to_details() {
        let detail = FailureDetail::from(&HttpError::ServerError {
            status: 500,
            body: "oops".to_string(),
        });
        assert_eq!(
            detail,
            FailureDetail::Http {
                status_code: 500,
                body: "oops".to_string()
            }
        );
        assert_eq!(
            detail.to_string(),
            r#"{"kind":"http","status_code":500,"body":"oops"}"#
        );

        let detail = FailureDetail::from(&HttpError::Timeout);
        assert_eq!(detail.kind(), "transport");
        assert!(detail.to_string().contains("timed out"));
    }
}
