use serde::{Deserialize, Serialize};

/// One polled measurement of a running test's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(rename = "total_numberof_requests")]
    pub total_requests: u64,
    pub succeeded_requests: u64,
    pub failed_requests: u64,
    pub target_users: u64,
}

impl ProgressSnapshot {
    /// `succeeded <= total` and `failed == total - succeeded`.
    pub fn is_consistent(&self) -> bool {
        self.succeeded_requests <= self.total_requests
            && self.failed_requests == self.total_requests - self.succeeded_requests
    }

    /// Fraction of requests that succeeded, 0.0 before the first request.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.succeeded_requests as f64 / self.total_requests as f64
        }
    }
}

/// Body of `GET /tests/{id}/updates`. A null or absent `update` means the
/// test has finished.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    #[serde(default)]
    pub update: Option<ProgressSnapshot>,
}
