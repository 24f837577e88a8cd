//! loadctl -- submit HTTP load tests to a remote execution service and
//! follow them to completion.
//!
//! The core is the submit-then-poll workflow: a validated [`model::TestConfig`]
//! is submitted through a [`client::LoadTestService`], a
//! [`poller::PollingController`] queries progress at a fixed cadence until the
//! service signals the end of the test, and [`workflow::TestWorkflow`] exposes
//! the resulting state to whoever renders it.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod poller;
pub mod report;
pub mod workflow;

use anyhow::{Context, Result};

use crate::client::HttpLoadTestService;
use crate::config::LoadctlConfig;

/// Build the HTTP service client described by `config`.
pub fn connect(config: &LoadctlConfig) -> Result<HttpLoadTestService> {
    let base_url = config.base_url()?;
    let timeout = config.request_timeout()?;
    tracing::debug!(%base_url, timeout_secs = timeout.as_secs(), "creating service client");
    HttpLoadTestService::new(base_url, timeout).context("failed to build HTTP client")
}
