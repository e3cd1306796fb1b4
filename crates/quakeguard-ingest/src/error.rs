//! Error types for event ingestion.

use quakeguard_core::error::QuakeError;

/// Failures of a single poll or connection attempt.
///
/// None of these cross the gateway boundary: the poller logs and retries on
/// its next tick, the listener schedules a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Device is offline")]
    Offline,
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("Unexpected content type: {0}")]
    ContentType(String),
    #[error("Malformed feed body: {0}")]
    Malformed(String),
    #[error("Stream transport error: {0}")]
    Transport(String),
    #[error("Stream closed")]
    Closed,
}

impl IngestError {
    /// Whether retrying on the next cycle can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IngestError::Offline
                | IngestError::Timeout(_)
                | IngestError::Network(_)
                | IngestError::HttpStatus(_)
                | IngestError::ContentType(_)
                | IngestError::Transport(_)
                | IngestError::Closed
        )
    }
}

impl From<IngestError> for QuakeError {
    fn from(err: IngestError) -> Self {
        QuakeError::Ingest(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Malformed(err.to_string())
    }
}
