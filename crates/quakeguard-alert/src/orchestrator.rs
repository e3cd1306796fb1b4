//! Alert delivery orchestrator.
//!
//! Arbitrates between competing alerts and runs the winner's channels. At
//! most one session is active at a time; a new request either preempts it
//! (strictly higher priority) or is discarded. The async mutex is held
//! across compare, teardown and start so concurrent callers are
//! linearizable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use quakeguard_core::clock::Clock;
use quakeguard_core::events::DomainEvent;
use quakeguard_core::types::{AlertChannel, AlertRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::ChannelRegistry;
use crate::error::AlertError;
use crate::platform::AlertPlatform;
use crate::session::{ActiveAlertSession, EndReason, SessionInfo};

const EVENT_CAPACITY: usize = 256;

/// Result of [`AlertOrchestrator::send_alert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SendOutcome {
    /// Nothing was active; a new session started.
    Started { session_id: Uuid },
    /// The previous session was torn down in favor of this one.
    Preempted { session_id: Uuid, replaced: Uuid },
    /// An equal or higher priority session is already active.
    Discarded { active_session_id: Uuid },
}

impl SendOutcome {
    /// The session now delivering this request, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            SendOutcome::Started { session_id } | SendOutcome::Preempted { session_id, .. } => {
                Some(*session_id)
            }
            SendOutcome::Discarded { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Active,
}

struct Inner {
    platform: Arc<dyn AlertPlatform>,
    registry: ChannelRegistry,
    clock: Arc<dyn Clock>,
    active: Mutex<Option<ActiveAlertSession>>,
    events: broadcast::Sender<DomainEvent>,
    shutting_down: AtomicBool,
}

/// Cheap to clone; clones share the same active session.
#[derive(Clone)]
pub struct AlertOrchestrator {
    inner: Arc<Inner>,
}

impl AlertOrchestrator {
    pub fn new(
        platform: Arc<dyn AlertPlatform>,
        registry: ChannelRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                platform,
                registry,
                clock,
                active: Mutex::new(None),
                events,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Status events: started, discarded, preempted, ended, channel failures.
    pub fn events(&self) -> broadcast::Receiver<DomainEvent> {
        self.inner.events.subscribe()
    }

    /// Deliver `request`, arbitrating against the active session.
    ///
    /// Returns once every channel task has been spawned.
    pub async fn send_alert(&self, request: AlertRequest) -> Result<SendOutcome, AlertError> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(AlertError::ShuttingDown);
        }
        if request.channels.is_empty() {
            return Err(AlertError::NoChannels);
        }

        let inner = &self.inner;
        let mut active = inner.active.lock().await;
        let now = inner.clock.now();

        if let Some(current) = active.as_ref() {
            if request.priority <= current.priority() {
                info!(
                    active_session = %current.id(),
                    active_priority = %current.priority(),
                    rejected_priority = %request.priority,
                    "Alert discarded, active session has equal or higher priority"
                );
                let _ = inner.events.send(DomainEvent::AlertDiscarded {
                    active_session_id: current.id(),
                    active_priority: current.priority(),
                    rejected_priority: request.priority,
                    timestamp: now,
                });
                return Ok(SendOutcome::Discarded {
                    active_session_id: current.id(),
                });
            }
        }

        // Taken out before teardown: if this future is dropped mid-way the
        // old session is dropped with it instead of lingering as active.
        let replaced = match active.take() {
            Some(mut current) => {
                let previous = current.id();
                info!(
                    session_id = %previous,
                    by_priority = %request.priority,
                    "Preempting active alert"
                );
                let _ = inner.events.send(DomainEvent::AlertPreempted {
                    session_id: previous,
                    by_priority: request.priority,
                    timestamp: now,
                });
                inner.end(&mut current, EndReason::Preempted).await;
                Some(previous)
            }
            None => None,
        };

        let session = inner.start(request, Arc::downgrade(&self.inner));
        let session_id = session.id();
        *active = Some(session);

        Ok(match replaced {
            Some(replaced) => SendOutcome::Preempted {
                session_id,
                replaced,
            },
            None => SendOutcome::Started { session_id },
        })
    }

    /// End the active session, if any. Returns its id.
    pub async fn cancel_alert(&self) -> Option<Uuid> {
        self.inner.end_active(None, EndReason::Cancelled).await
    }

    pub async fn active_session(&self) -> Option<SessionInfo> {
        self.inner.active.lock().await.as_ref().map(|s| s.info())
    }

    pub async fn state(&self) -> OrchestratorState {
        match self.inner.active.lock().await.as_ref() {
            Some(_) => OrchestratorState::Active,
            None => OrchestratorState::Idle,
        }
    }

    /// Refuse new alerts and tear down the active one.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.inner.end_active(None, EndReason::Shutdown).await;
    }
}

impl Inner {
    fn start(&self, request: AlertRequest, weak: Weak<Inner>) -> ActiveAlertSession {
        let mut session =
            ActiveAlertSession::new(request, self.clock.now(), Arc::clone(&self.platform));
        let session_id = session.id();
        let channels = session.request().channels.enabled();
        let priority = session.priority();
        let duration_secs = session.request().duration_secs;

        for channel in &channels {
            let channel = *channel;
            let Some(handler) = self.registry.get(channel) else {
                warn!(session_id = %session_id, %channel, "No handler registered for channel");
                self.channel_failed(session_id, channel, "no handler registered".into());
                continue;
            };
            let ctx = session.context(channel);
            let events = self.events.clone();
            let clock = Arc::clone(&self.clock);
            session.add_channel_task(tokio::spawn(async move {
                if let Err(e) = handler.deliver(ctx).await {
                    warn!(session_id = %session_id, %channel, error = %e, "Channel delivery failed");
                    let _ = events.send(DomainEvent::ChannelFailed {
                        session_id,
                        channel,
                        reason: e.to_string(),
                        timestamp: clock.now(),
                    });
                }
            }));
        }

        if duration_secs > 0 {
            session.set_timer(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(duration_secs)).await;
                if let Some(inner) = weak.upgrade() {
                    inner.end_active(Some(session_id), EndReason::Timeout).await;
                }
            }));
        }

        info!(
            session_id = %session_id,
            %priority,
            channels = channels.len(),
            duration_secs,
            "Alert session started"
        );
        let _ = self.events.send(DomainEvent::AlertStarted {
            session_id,
            priority,
            channels,
            timestamp: self.clock.now(),
        });
        session
    }

    /// End the active session. With `expected` set, only that session is
    /// ended, so a stale timer cannot end its successor.
    async fn end_active(&self, expected: Option<Uuid>, reason: EndReason) -> Option<Uuid> {
        let mut active = self.active.lock().await;
        match (active.as_ref(), expected) {
            (None, _) => return None,
            (Some(current), Some(id)) if current.id() != id => {
                debug!(session_id = %id, "Ignoring end request for a session no longer active");
                return None;
            }
            _ => {}
        }
        let mut session = active.take()?;
        self.end(&mut session, reason).await;
        Some(session.id())
    }

    async fn end(&self, session: &mut ActiveAlertSession, reason: EndReason) {
        let released = session.teardown(reason).await;
        info!(session_id = %session.id(), %reason, released, "Alert session ended");
        let _ = self.events.send(DomainEvent::AlertEnded {
            session_id: session.id(),
            reason: reason.to_string(),
            released,
            timestamp: self.clock.now(),
        });
    }

    fn channel_failed(&self, session_id: Uuid, channel: AlertChannel, reason: String) {
        let _ = self.events.send(DomainEvent::ChannelFailed {
            session_id,
            channel,
            reason,
            timestamp: self.clock.now(),
        });
    }
}
