//! HTTP event feed: body parsing, the client seam and its reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use crate::error::IngestError;
use crate::normalizer::RawEventReport;

/// Items of a decoded payload: a bare array, or an object wrapping one under
/// `result` or `data`. Anything else yields `None`.
pub fn extract_reports(value: Value) -> Option<Vec<RawEventReport>> {
    match value {
        Value::Array(items) => Some(items.into_iter().map(RawEventReport).collect()),
        Value::Object(mut obj) => ["result", "data"].iter().find_map(|key| {
            match obj.remove(*key) {
                Some(Value::Array(items)) => Some(items.into_iter().map(RawEventReport).collect()),
                _ => None,
            }
        }),
        _ => None,
    }
}

/// Parse a complete poll response body.
pub fn parse_feed_body(body: &str) -> Result<Vec<RawEventReport>, IngestError> {
    let value: Value = serde_json::from_str(body)?;
    extract_reports(value)
        .ok_or_else(|| IngestError::Malformed("expected an array or a result/data envelope".into()))
}

/// The rolling time window requested on each poll.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: u32,
}

impl FeedWindow {
    pub fn ending_at(end: DateTime<Utc>, window_minutes: u32, limit: u32) -> Self {
        Self {
            start: end - chrono::Duration::minutes(window_minutes as i64),
            end,
            limit,
        }
    }
}

/// Fetches one page of the event feed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Returns the raw response body once status and content type check out.
    async fn fetch(&self, window: FeedWindow) -> Result<String, IngestError>;
}

/// Whether the device currently has a network path.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity for hosts without a reachability signal.
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// reqwest-backed [`FeedClient`].
pub struct HttpFeedClient {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl HttpFeedClient {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("quakeguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout_secs,
        })
    }

    fn map_error(&self, err: reqwest::Error) -> IngestError {
        if err.is_timeout() {
            IngestError::Timeout(self.timeout_secs)
        } else {
            IngestError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch(&self, window: FeedWindow) -> Result<String, IngestError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("start", window.start.to_rfc3339()),
                ("end", window.end.to_rfc3339()),
                ("limit", window.limit.to_string()),
            ])
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::HttpStatus(status.as_u16()));
        }

        // A missing header is tolerated; the body parse is the final check.
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("json") {
                return Err(IngestError::ContentType(content_type.to_string()));
            }
        }

        let body = response.text().await.map_err(|e| self.map_error(e))?;
        debug!(url = %self.url, bytes = body.len(), "Feed response received");
        Ok(body)
    }
}
