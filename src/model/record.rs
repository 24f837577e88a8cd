//! Test records as stored by the service, including the terminal report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status reported by the service for a test.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TestStatus {
    #[default]
    Unknown,
    InProgress,
    Done,
    Other(String),
}

impl TestStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, TestStatus::Done)
    }
}

impl From<String> for TestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" => TestStatus::Unknown,
            "IN_PROGRESS" => TestStatus::InProgress,
            "DONE" => TestStatus::Done,
            _ => TestStatus::Other(s),
        }
    }
}

impl From<TestStatus> for String {
    fn from(status: TestStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Unknown => write!(f, ""),
            TestStatus::InProgress => write!(f, "IN_PROGRESS"),
            TestStatus::Done => write!(f, "DONE"),
            TestStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Final aggregated metrics of a finished test. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub average_response_time: f64,
    pub peak_response_time: f64,
    pub error_rate: f64,
    pub throughput: f64,
    #[serde(rename = "p_50_percentile")]
    pub p50: f64,
    #[serde(rename = "p_90_percentile")]
    pub p90: f64,
    #[serde(rename = "p_99_percentile")]
    pub p99: f64,
}

impl Report {
    /// True when every metric is zero, which is how the service serializes a
    /// report that has not been computed yet.
    pub fn is_empty(&self) -> bool {
        *self == Report::default()
    }
}

/// Full test record from `GET /tests/{id}` (and each entry of `GET /tests`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRecord {
    pub uuid: String,
    #[serde(rename = "CreatedAt")]
    pub created_at: Option<DateTime<Utc>>,
    pub url: String,
    pub method: String,
    pub target_users: u32,
    pub users_to_start_with: u32,
    pub reach_peak_after_in_minutes: u32,
    pub status: TestStatus,
    pub total_requests: u64,
    pub succeeded_requests: u64,
    pub report: Option<Report>,
}

impl TestRecord {
    pub fn failed_requests(&self) -> u64 {
        self.total_requests.saturating_sub(self.succeeded_requests)
    }

    /// The report of a finished test. `None` while the test is still running
    /// or when the service sent only the zeroed placeholder.
    pub fn final_report(&self) -> Option<&Report> {
        if !self.status.is_done() {
            return None;
        }
        self.report.as_ref().filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_record() -> &'static str {
        r#"
        {
          "ID": 7,
          "CreatedAt": "2025-01-12T10:15:30.123456+05:30",
          "UpdatedAt": "2025-01-12T10:17:31.000000+05:30",
          "uuid": "abc-123",
          "url": "https://example.com",
          "method": "GET",
          "headers": {},
          "target_users": 100,
          "reach_peak_after_in_minutes": 2,
          "users_to_start_with": 1,
          "status": "DONE",
          "total_requests": 1200,
          "succeeded_requests": 1150,
          "report": {
            "average_response_time": 0.21,
            "peak_response_time": 1.9,
            "error_rate": 4.16,
            "throughput": 9.58,
            "p_50_percentile": 0.18,
            "p_90_percentile": 0.44,
            "p_99_percentile": 1.2,
            "succeeded_requests": 1150,
            "failed_requests": 50,
            "requested_done": 1200
          }
        }
        "#
    }

    #[test]
    fn test_record_parse() {
        let rec: TestRecord = serde_json::from_str(fixture_record()).unwrap();
        assert_eq!(rec.uuid, "abc-123");
        assert_eq!(rec.status, TestStatus::Done);
        assert!(rec.status.is_done());
        assert_eq!(rec.total_requests, 1200);
        assert_eq!(rec.failed_requests(), 50);
        let created = rec.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2025-01-12T04:45:30.123456+00:00");

        let report = rec.report.unwrap();
        assert_eq!(report.p50, 0.18);
        assert_eq!(report.p99, 1.2);
        assert_eq!(report.throughput, 9.58);
    }

    #[test]
    fn test_sparse_record_uses_defaults() {
        let rec: TestRecord = serde_json::from_str(r#"{"uuid":"x","status":"IN_PROGRESS"}"#).unwrap();
        assert_eq!(rec.status, TestStatus::InProgress);
        assert_eq!(rec.total_requests, 0);
        assert!(rec.report.is_none());
        assert!(rec.created_at.is_none());
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let rec: TestRecord = serde_json::from_str(r#"{"status":"CANCELLED"}"#).unwrap();
        assert_eq!(rec.status, TestStatus::Other("CANCELLED".to_string()));
        assert_eq!(rec.status.to_string(), "CANCELLED");
    }

    #[test]
    fn test_failed_requests_saturates() {
        let rec = TestRecord {
            total_requests: 3,
            succeeded_requests: 5,
            ..TestRecord::default()
        };
        assert_eq!(rec.failed_requests(), 0);
    }

    #[test]
    fn test_zeroed_report_is_not_final() {
        let rec: TestRecord = serde_json::from_str(
            r#"{
                "uuid": "abc-123",
                "status": "IN_PROGRESS",
                "report": {
                    "average_response_time": 0,
                    "peak_response_time": 0,
                    "error_rate": 0,
                    "throughput": 0,
                    "p_50_percentile": 0,
                    "p_90_percentile": 0,
                    "p_99_percentile": 0
                }
            }"#,
        )
        .unwrap();
        assert!(rec.report.unwrap().is_empty());
        assert!(rec.final_report().is_none());

        // Done but still zeroed: nothing to show either.
        let done = TestRecord {
            status: TestStatus::Done,
            ..rec.clone()
        };
        assert!(done.final_report().is_none());
    }

    #[test]
    fn test_final_report_requires_done_status() {
        let rec: TestRecord = serde_json::from_str(fixture_record()).unwrap();
        assert_eq!(rec.final_report().map(|r| r.p90), Some(0.44));

        let running = TestRecord {
            status: TestStatus::InProgress,
            ..rec
        };
        assert!(running.report.is_some());
        assert!(running.final_report().is_none());
    }
}
