//! Error taxonomy for the submission-and-polling workflow.
//!
//! Every failure is scoped to one workflow instance: errors are returned to
//! the caller or folded into the workflow state, never escalated to a
//! process-wide handler.

use thiserror::Error;

use crate::model::TestId;

/// A `TestConfig` invariant was violated. Raised before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("url must not be empty")]
    EmptyUrl,

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme {scheme:?}; expected http or https")]
    UnsupportedScheme { scheme: String },

    #[error("unsupported method {0:?}; expected one of GET, POST, PUT, DELETE")]
    UnsupportedMethod(String),

    #[error("{field} must be at least 1")]
    NotPositive { field: &'static str },

    #[error("users_to_start_with ({start}) must not exceed target_users ({target})")]
    StartExceedsTarget { start: u32, target: u32 },

    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    #[error("success status code {0} is outside 100..=599")]
    InvalidStatusCode(u16),
}

/// One failed exchange with the test service, independent of which call made it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The service answered with a non-2xx status.
    #[error("Error: {code} - {reason}")]
    Status { code: u16, reason: String },

    #[error("failed to reach the test service: {0}")]
    Transport(String),

    #[error("unexpected response from the test service: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            code: status.as_u16(),
            reason: status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Submitting a test failed. Never retried; the user has to submit again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("unexpected response from the test service: missing test id")]
    MissingId,
}

/// A poll tick failed. The polling session that produced it has already stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("polling test {id} failed: {cause}")]
pub struct PollingError {
    pub id: TestId,
    #[source]
    pub cause: RequestError,
}

/// Failure of one of the read-only calls backing the results surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {cause}")]
pub struct ApiError {
    pub operation: &'static str,
    #[source]
    pub cause: RequestError,
}

/// Errors returned by [`crate::workflow::TestWorkflow::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("workflow already started (state: {state}); create a new workflow to run another test")]
    AlreadyStarted { state: &'static str },
}
