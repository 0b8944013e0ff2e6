//! HTTP checks against a deployed sample
//!
//! Each [`EndpointTest`] sends one request to the service and passes when the
//! response status is one of the statuses it expects. Without a richer test
//! description the sample is checked with a single `GET /` expecting `200`.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTest {
    pub path: String,
    pub method: Method,
    pub expected_statuses: Vec<u16>,
}

impl EndpointTest {
    pub fn get(path: impl Into<String>, expected_status: u16) -> Self {
        Self {
            path: path.into(),
            method: Method::GET,
            expected_statuses: vec![expected_status],
        }
    }

    pub fn expects(&self, status: u16) -> bool {
        self.expected_statuses.contains(&status)
    }
}

impl std::fmt::Display for EndpointTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// The checks run when a sample describes none of its own
pub fn default_tests() -> Vec<EndpointTest> {
    vec![EndpointTest::get("/", 200)]
}

/// Outcome of one endpoint check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub test: String,
    pub status: u16,
    pub passed: bool,
}

pub struct EndpointProber {
    client: Client,
    identity_token: String,
}

impl EndpointProber {
    pub fn new(identity_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            identity_token: identity_token.into(),
        })
    }

    /// Sends one request; transport failures are errors, unexpected statuses are not
    pub fn probe(&self, base_url: &str, test: &EndpointTest) -> Result<ProbeResult> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), test.path);
        info!(method = %test.method, url = %url, "Checking endpoint");

        let response = self
            .client
            .request(test.method.clone(), &url)
            .header(AUTHORIZATION, format!("Bearer {}", self.identity_token))
            .send()
            .with_context(|| format!("{} {} failed", test.method, url))?;
        let status = response.status().as_u16();
        let passed = test.expects(status);

        if passed {
            info!(status, test = %test, "Endpoint check passed");
        } else {
            let body = response
                .text()
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            warn!(
                status,
                expected = ?test.expected_statuses,
                test = %test,
                body = %body,
                "Endpoint check failed"
            );
        }

        Ok(ProbeResult {
            test: test.to_string(),
            status,
            passed,
        })
    }

    /// Runs every test, even after a failure, and reports each outcome
    pub fn probe_all(&self, base_url: &str, tests: &[EndpointTest]) -> Result<Vec<ProbeResult>> {
        tests.iter().map(|test| self.probe(base_url, test)).collect()
    }
}
