//! Error types for alert decision and delivery.

use quakeguard_core::error::QuakeError;
use quakeguard_core::types::AlertChannel;

/// Contract violations at the orchestrator boundary.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Alert request enables no channels")]
    NoChannels,
    #[error("Alert orchestrator is shutting down")]
    ShuttingDown,
}

/// Failure of a single channel. Logged and isolated; siblings keep running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel not supported on this platform: {0}")]
    Unsupported(AlertChannel),
    #[error("Permission denied for channel: {0}")]
    PermissionDenied(AlertChannel),
    #[error("Platform call failed: {0}")]
    Platform(String),
    #[error("Alert request is missing {0}")]
    MissingContent(&'static str),
}

/// Device geolocation failures. The provider falls back to the configured
/// home location when it can.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

impl From<AlertError> for QuakeError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::ShuttingDown => QuakeError::ShuttingDown,
            other => QuakeError::Alert(other.to_string()),
        }
    }
}

impl From<LocationError> for QuakeError {
    fn from(err: LocationError) -> Self {
        QuakeError::Location(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_error_display() {
        assert_eq!(
            AlertError::NoChannels.to_string(),
            "Alert request enables no channels"
        );
        assert_eq!(
            AlertError::ShuttingDown.to_string(),
            "Alert orchestrator is shutting down"
        );
    }

    #[test]
    fn test_channel_error_display() {
        assert_eq!(
            ChannelError::Unsupported(AlertChannel::Bluetooth).to_string(),
            "Channel not supported on this platform: bluetooth"
        );
        assert_eq!(
            ChannelError::MissingContent("speech text").to_string(),
            "Alert request is missing speech text"
        );
    }

    #[test]
    fn test_conversions_into_quake_error() {
        let err: QuakeError = AlertError::ShuttingDown.into();
        assert!(matches!(err, QuakeError::ShuttingDown));

        let err: QuakeError = AlertError::NoChannels.into();
        assert!(matches!(err, QuakeError::Alert(_)));

        let err: QuakeError = LocationError::Unavailable("no satellites".into()).into();
        assert!(err.to_string().contains("no satellites"));
    }
}
