use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AlertChannel, AlertPriority, ConnectionState, IngestMode, Timestamp};

/// Status events published by the pipeline.
///
/// Consumed by collaborators through a broadcast channel (status displays,
/// diagnostics) and mirrored into the tracing log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainEvent {
    // =========================================================================
    // Ingestion Events
    // =========================================================================
    /// A new (previously unseen) event was delivered to subscribers.
    EventDelivered {
        event_id: String,
        source: String,
        magnitude: f64,
        timestamp: Timestamp,
    },

    /// A poll cycle finished.
    PollCompleted {
        items: usize,
        delivered: usize,
        skipped: usize,
        timestamp: Timestamp,
    },

    /// A poll cycle failed; the next tick proceeds on schedule.
    PollFailed {
        reason: String,
        timestamp: Timestamp,
    },

    /// The stream listener changed state.
    ConnectionStateChanged {
        from: ConnectionState,
        to: ConnectionState,
        timestamp: Timestamp,
    },

    /// The stream listener exhausted its reconnect budget and stopped for good.
    StreamExhausted {
        attempts: u32,
        mode: IngestMode,
        timestamp: Timestamp,
    },

    // =========================================================================
    // Alert Events
    // =========================================================================
    /// An alert session started.
    AlertStarted {
        session_id: Uuid,
        priority: AlertPriority,
        channels: Vec<AlertChannel>,
        timestamp: Timestamp,
    },

    /// A lower-or-equal priority request arrived while an alert was active.
    AlertDiscarded {
        active_session_id: Uuid,
        active_priority: AlertPriority,
        rejected_priority: AlertPriority,
        timestamp: Timestamp,
    },

    /// The active session was replaced by a strictly higher priority alert.
    AlertPreempted {
        session_id: Uuid,
        by_priority: AlertPriority,
        timestamp: Timestamp,
    },

    /// A session ended (manual cancel, timer or preemption) and its
    /// resources were released.
    AlertEnded {
        session_id: Uuid,
        reason: String,
        released: usize,
        timestamp: Timestamp,
    },

    /// One channel failed; siblings keep running.
    ChannelFailed {
        session_id: Uuid,
        channel: AlertChannel,
        reason: String,
        timestamp: Timestamp,
    },
}

impl DomainEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DomainEvent::EventDelivered { timestamp, .. }
            | DomainEvent::PollCompleted { timestamp, .. }
            | DomainEvent::PollFailed { timestamp, .. }
            | DomainEvent::ConnectionStateChanged { timestamp, .. }
            | DomainEvent::StreamExhausted { timestamp, .. }
            | DomainEvent::AlertStarted { timestamp, .. }
            | DomainEvent::AlertDiscarded { timestamp, .. }
            | DomainEvent::AlertPreempted { timestamp, .. }
            | DomainEvent::AlertEnded { timestamp, .. }
            | DomainEvent::ChannelFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a stable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::EventDelivered { .. } => "event_delivered",
            DomainEvent::PollCompleted { .. } => "poll_completed",
            DomainEvent::PollFailed { .. } => "poll_failed",
            DomainEvent::ConnectionStateChanged { .. } => "connection_state_changed",
            DomainEvent::StreamExhausted { .. } => "stream_exhausted",
            DomainEvent::AlertStarted { .. } => "alert_started",
            DomainEvent::AlertDiscarded { .. } => "alert_discarded",
            DomainEvent::AlertPreempted { .. } => "alert_preempted",
            DomainEvent::AlertEnded { .. } => "alert_ended",
            DomainEvent::ChannelFailed { .. } => "channel_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_timestamp() {
        let ts = Timestamp(1_700_000_000_000);
        let event = DomainEvent::PollFailed {
            reason: "timeout".into(),
            timestamp: ts,
        };
        assert_eq!(event.timestamp(), ts);
    }

    #[test]
    fn test_event_names() {
        let ts = Timestamp::now();
        let cases = vec![
            (
                DomainEvent::StreamExhausted {
                    attempts: 5,
                    mode: IngestMode::PollerOnly,
                    timestamp: ts,
                },
                "stream_exhausted",
            ),
            (
                DomainEvent::ConnectionStateChanged {
                    from: ConnectionState::Connecting,
                    to: ConnectionState::Connected,
                    timestamp: ts,
                },
                "connection_state_changed",
            ),
            (
                DomainEvent::AlertEnded {
                    session_id: Uuid::new_v4(),
                    reason: "timeout".into(),
                    released: 3,
                    timestamp: ts,
                },
                "alert_ended",
            ),
        ];
        for (event, name) in cases {
            assert_eq!(event.event_name(), name);
        }
    }

    #[test]
    fn test_event_serializes() {
        let event = DomainEvent::AlertStarted {
            session_id: Uuid::new_v4(),
            priority: AlertPriority::Critical,
            channels: vec![AlertChannel::Push, AlertChannel::AlarmSound],
            timestamp: Timestamp(1),
        };
        let json = serde_json::to_value(&event).unwrap();
        // Externally tagged: the variant name is the only top-level key.
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert_eq!(json["AlertStarted"]["priority"], "critical");
        assert_eq!(json["AlertStarted"]["channels"][1], "alarm_sound");
    }
}
