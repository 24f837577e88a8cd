//! Client side of the load-test service HTTP contract.
//!
//! [`LoadTestService`] is the seam the poller and the workflow depend on;
//! [`HttpLoadTestService`] is the reqwest-backed implementation used at runtime.

use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ApiError, PollingError, RequestError, SubmissionError};
use crate::model::{ProgressSnapshot, TestConfig, TestId, TestRecord, UpdateEnvelope};

/// Operations offered by the remote test-execution service.
#[async_trait::async_trait]
pub trait LoadTestService: Send + Sync {
    /// `POST /tests`. Exactly one request, no retries.
    async fn submit(&self, config: &TestConfig) -> Result<TestId, SubmissionError>;

    /// `GET /tests/{id}/updates`. `Ok(None)` is the termination sentinel.
    async fn fetch_update(&self, id: &TestId) -> Result<Option<ProgressSnapshot>, PollingError>;

    /// `GET /tests`.
    async fn list_tests(&self) -> Result<Vec<TestRecord>, ApiError>;

    /// `GET /tests/{id}`.
    async fn get_test(&self, id: &TestId) -> Result<TestRecord, ApiError>;

    /// `GET /ping`.
    async fn ping(&self) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct CreateTestResponse {
    id: Option<TestId>,
}

/// HTTP implementation of [`LoadTestService`].
#[derive(Debug, Clone)]
pub struct HttpLoadTestService {
    client: Client,
    base_url: Url,
}

impl HttpLoadTestService {
    /// Build a client against `base_url`. `timeout` bounds each individual request.
    pub fn new(base_url: Url, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("loadctl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL, keeping any base path prefix.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RequestError> {
        debug!(%url, "GET");
        let resp = self.client.get(url).send().await?;
        read_json(resp).await
    }
}

/// Reject non-2xx statuses, then decode the body.
async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, RequestError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(RequestError::from_status(status));
    }
    resp.json::<T>()
        .await
        .map_err(|e| RequestError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl LoadTestService for HttpLoadTestService {
    async fn submit(&self, config: &TestConfig) -> Result<TestId, SubmissionError> {
        let url = self.endpoint(&["tests"]);
        info!(%url, target_url = %config.url(), method = %config.method(), "submitting load test");

        let resp = self
            .client
            .post(url)
            .json(config)
            .send()
            .await
            .map_err(RequestError::from)?;
        let body: CreateTestResponse = read_json(resp).await?;

        match body.id {
            Some(id) if !id.is_empty() => {
                info!(test_id = %id, "load test accepted");
                Ok(id)
            }
            _ => Err(SubmissionError::MissingId),
        }
    }

    async fn fetch_update(&self, id: &TestId) -> Result<Option<ProgressSnapshot>, PollingError> {
        let url = self.endpoint(&["tests", id.as_str(), "updates"]);
        let envelope: UpdateEnvelope =
            self.get_json(url).await.map_err(|cause| PollingError {
                id: id.clone(),
                cause,
            })?;
        Ok(envelope.update)
    }

    async fn list_tests(&self) -> Result<Vec<TestRecord>, ApiError> {
        self.get_json(self.endpoint(&["tests"]))
            .await
            .map_err(|cause| ApiError {
                operation: "list tests",
                cause,
            })
    }

    async fn get_test(&self, id: &TestId) -> Result<TestRecord, ApiError> {
        self.get_json(self.endpoint(&["tests", id.as_str()]))
            .await
            .map_err(|cause| ApiError {
                operation: "get test",
                cause,
            })
    }

    async fn ping(&self) -> Result<(), ApiError> {
        let to_api = |cause| ApiError {
            operation: "ping",
            cause,
        };
        let resp = self
            .client
            .get(self.endpoint(&["ping"]))
            .send()
            .await
            .map_err(|e| to_api(RequestError::from(e)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(to_api(RequestError::from_status(resp.status())))
        }
    }
}
