//! Load test request: the raw form input and its validated counterpart.

use std::collections::BTreeMap;
use std::str::FromStr;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// HTTP method the load engine uses against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(ValidationError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Unvalidated test parameters as entered by the user.
///
/// Defaults mirror the pre-filled form: `GET`, 100 target users, starting
/// with 1 user, reaching the peak after 2 minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfigDraft {
    pub url: String,
    pub method: HttpMethod,
    pub target_users: u32,
    pub users_to_start_with: u32,
    pub reach_peak_after_minutes: u32,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub success_status_codes: Vec<u16>,
}

impl Default for TestConfigDraft {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: HttpMethod::Get,
            target_users: 100,
            users_to_start_with: 1,
            reach_peak_after_minutes: 2,
            headers: BTreeMap::new(),
            body: None,
            success_status_codes: Vec::new(),
        }
    }
}

impl TestConfigDraft {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Check every invariant and freeze the draft into a [`TestConfig`].
    pub fn validate(self) -> Result<TestConfig, ValidationError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        let parsed = Url::parse(url).map_err(|e| ValidationError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme {
                scheme: parsed.scheme().to_string(),
            });
        }

        for (field, value) in [
            ("target_users", self.target_users),
            ("users_to_start_with", self.users_to_start_with),
            ("reach_peak_after_minutes", self.reach_peak_after_minutes),
        ] {
            if value == 0 {
                return Err(ValidationError::NotPositive { field });
            }
        }
        if self.users_to_start_with > self.target_users {
            return Err(ValidationError::StartExceedsTarget {
                start: self.users_to_start_with,
                target: self.target_users,
            });
        }

        for (name, value) in &self.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return Err(ValidationError::InvalidHeader { name: name.clone() });
            }
        }
        if let Some(code) = self
            .success_status_codes
            .iter()
            .copied()
            .find(|c| !(100..=599).contains(c))
        {
            return Err(ValidationError::InvalidStatusCode(code));
        }

        Ok(TestConfig {
            url: url.to_string(),
            method: self.method,
            target_users: self.target_users,
            users_to_start_with: self.users_to_start_with,
            reach_peak_after_minutes: self.reach_peak_after_minutes,
            headers: self.headers,
            body: self.body,
            success_status_codes: self.success_status_codes,
        })
    }
}

/// A validated, immutable load test request. Serializes to the service's
/// create-test body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestConfig {
    url: String,
    method: HttpMethod,
    target_users: u32,
    users_to_start_with: u32,
    // Field name matches the service's wire format, typo included.
    #[serde(rename = "reach_peak_afer_in_minutes")]
    reach_peak_after_minutes: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    success_status_codes: Vec<u16>,
}

impl TestConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn target_users(&self) -> u32 {
        self.target_users
    }

    pub fn users_to_start_with(&self) -> u32 {
        self.users_to_start_with
    }

    pub fn reach_peak_after_minutes(&self) -> u32 {
        self.reach_peak_after_minutes
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn success_status_codes(&self) -> &[u16] {
        &self.success_status_codes
    }
}

impl TryFrom<TestConfigDraft> for TestConfig {
    type Error = ValidationError;

    fn try_from(draft: TestConfigDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}
