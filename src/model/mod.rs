//! Data model shared by the client, the poller and the workflow.

mod progress;
mod record;
mod test_config;

pub use self::progress::{ProgressSnapshot, UpdateEnvelope};
pub use self::record::{Report, TestRecord, TestStatus};
pub use self::test_config::{HttpMethod, TestConfig, TestConfigDraft};

use serde::{Deserialize, Serialize};

/// Opaque handle the service assigns to a submitted test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
