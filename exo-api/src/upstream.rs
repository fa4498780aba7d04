//! Upstream candidate catalogue client
//!
//! The canonical upstream is the NASA Exoplanet Archive TAP sync service,
//! queried for `cumulative` rows still dispositioned CANDIDATE, in JSON
//! format. The payload is a JSON array of flat objects; field presence and
//! typing vary row to row, so rows are decoded into loosely typed
//! [`CandidateRecord`]s and coerced later.

use async_trait::async_trait;
use exo_common::CandidateRecord;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("exo-api/", env!("CARGO_PKG_VERSION"));

/// Upstream fetch errors. Contained by the dataset cache, never surfaced
/// to API callers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    /// Connection, DNS, TLS or body transfer failure
    #[error("Network error: {0}")]
    Network(String),

    /// No complete response within the configured timeout
    #[error("Upstream timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response
    #[error("Upstream returned HTTP {0}: {1}")]
    Status(u16, String),

    /// Body is not a JSON array of records
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Source of raw candidate rows
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Identifier used in log lines
    fn describe(&self) -> String;

    /// Fetch the full candidate table
    async fn fetch(&self) -> Result<Vec<CandidateRecord>, UpstreamError>;
}

/// HTTP client for the TAP JSON endpoint
pub struct HttpCandidateSource {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpCandidateSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
        })
    }

    fn map_reqwest(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl CandidateSource for HttpCandidateSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<CandidateRecord>, UpstreamError> {
        debug!(url = %self.url, "Querying candidate catalogue");

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status(status.as_u16(), truncate(&error_text, 200)));
        }

        let body = response.bytes().await.map_err(|e| self.map_reqwest(e))?;
        let records = parse_payload(&body)?;

        info!(records = records.len(), bytes = body.len(), "Candidate catalogue fetched");
        Ok(records)
    }
}

/// Decode a TAP JSON body. Non-object rows are skipped.
pub fn parse_payload(body: &[u8]) -> Result<Vec<CandidateRecord>, UpstreamError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

    let rows = match value {
        serde_json::Value::Array(rows) => rows,
        other => {
            return Err(UpstreamError::Malformed(format!(
                "expected a JSON array of records, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = rows.len();
    let records: Vec<CandidateRecord> = rows
        .into_iter()
        .filter_map(|row| match row {
            serde_json::Value::Object(map) => Some(CandidateRecord::from(map)),
            _ => None,
        })
        .collect();

    if records.len() != total {
        warn!(skipped = total - records.len(), "Skipped non-object rows in upstream payload");
    }
    Ok(records)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
