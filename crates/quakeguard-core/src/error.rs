use thiserror::Error;

/// Top-level error type for QuakeGuard.
///
/// Subsystem crates define their own error enums and implement
/// `From<SubsystemError> for QuakeError` so that `?` works across crate
/// boundaries at the composition root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuakeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Alert error: {0}")]
    Alert(String),

    #[error("Location error: {0}")]
    Location(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for QuakeError {
    fn from(err: toml::de::Error) -> Self {
        QuakeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for QuakeError {
    fn from(err: toml::ser::Error) -> Self {
        QuakeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for QuakeError {
    fn from(err: serde_json::Error) -> Self {
        QuakeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for QuakeGuard operations.
pub type Result<T> = std::result::Result<T, QuakeError>;
