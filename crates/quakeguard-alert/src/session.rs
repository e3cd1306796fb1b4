//! The single in-flight alert and the resources it holds.

use std::fmt;
use std::sync::{Arc, Mutex};

use quakeguard_core::types::{AlertChannel, AlertPriority, AlertRequest, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::channel::ChannelContext;
use crate::platform::{AlertPlatform, PlatformHandle};

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Cancelled,
    Timeout,
    Preempted,
    Shutdown,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Cancelled => write!(f, "cancelled"),
            EndReason::Timeout => write!(f, "timeout"),
            EndReason::Preempted => write!(f, "preempted"),
            EndReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    handles: Vec<PlatformHandle>,
    closed: bool,
}

/// Every platform handle a session has acquired.
///
/// Once closed, `track` refuses new handles so the caller releases them
/// itself; nothing acquired after teardown can leak.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    state: Mutex<LedgerState>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record `handle`. Returns `false` if the ledger is already closed.
    pub fn track(&self, handle: PlatformHandle) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.handles.push(handle);
        true
    }

    /// Close the ledger and hand back everything it held. Later calls
    /// return an empty list.
    pub fn close(&self) -> Vec<PlatformHandle> {
        let mut state = self.lock();
        state.closed = true;
        std::mem::take(&mut state.handles)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only view of the active session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub priority: AlertPriority,
    pub title: String,
    pub channels: Vec<AlertChannel>,
    pub started_at: Timestamp,
    pub duration_secs: u64,
    pub held_resources: usize,
}

/// The one alert currently being delivered.
///
/// Owns the liveness signal its channels observe, the resource ledger,
/// the spawned channel tasks and the optional expiry timer. Handles still
/// in the ledger when the session is dropped are released in the
/// background.
pub struct ActiveAlertSession {
    id: Uuid,
    request: Arc<AlertRequest>,
    platform: Arc<dyn AlertPlatform>,
    started_at: Timestamp,
    liveness: watch::Sender<bool>,
    ledger: Arc<ResourceLedger>,
    channel_tasks: Vec<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    torn_down: bool,
}

impl ActiveAlertSession {
    pub fn new(
        request: AlertRequest,
        started_at: Timestamp,
        platform: Arc<dyn AlertPlatform>,
    ) -> Self {
        let (liveness, _) = watch::channel(true);
        Self {
            id: Uuid::new_v4(),
            request: Arc::new(request),
            platform,
            started_at,
            liveness,
            ledger: Arc::new(ResourceLedger::new()),
            channel_tasks: Vec::new(),
            timer: None,
            torn_down: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn priority(&self) -> AlertPriority {
        self.request.priority
    }

    pub fn request(&self) -> &AlertRequest {
        &self.request
    }

    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    pub fn is_live(&self) -> bool {
        !self.torn_down
    }

    /// Everything a channel handler needs to run inside this session.
    pub fn context(&self, channel: AlertChannel) -> ChannelContext {
        ChannelContext {
            session_id: self.id,
            channel,
            request: Arc::clone(&self.request),
            platform: Arc::clone(&self.platform),
            ledger: Arc::clone(&self.ledger),
            liveness: self.liveness.subscribe(),
        }
    }

    pub fn add_channel_task(&mut self, task: JoinHandle<()>) {
        self.channel_tasks.push(task);
    }

    pub fn set_timer(&mut self, timer: JoinHandle<()>) {
        self.timer = Some(timer);
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            priority: self.request.priority,
            title: self.request.title.clone(),
            channels: self.request.channels.enabled(),
            started_at: self.started_at,
            duration_secs: self.request.duration_secs,
            held_resources: self.ledger.len(),
        }
    }

    /// Signal every channel to stop and release all held resources.
    ///
    /// Idempotent: a second call releases nothing and returns 0. When the
    /// timer itself ends the session its task is left to finish instead of
    /// being aborted mid-release.
    ///
    /// Releasing runs on its own task, so dropping this future part way
    /// through still frees every handle.
    pub async fn teardown(&mut self, reason: EndReason) -> usize {
        if self.torn_down {
            return 0;
        }
        self.torn_down = true;
        self.liveness.send_replace(false);

        if let Some(timer) = self.timer.take() {
            if reason != EndReason::Timeout {
                timer.abort();
            }
        }

        // Channels wind down on their own once they observe the signal.
        self.channel_tasks.clear();

        let release = spawn_release(Arc::clone(&self.platform), self.ledger.close());
        match release.await {
            Ok(released) => released,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Resource release task failed");
                0
            }
        }
    }
}

fn spawn_release(
    platform: Arc<dyn AlertPlatform>,
    handles: Vec<PlatformHandle>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        for handle in &handles {
            platform.release(*handle).await;
        }
        handles.len()
    })
}

impl Drop for ActiveAlertSession {
    fn drop(&mut self) {
        self.liveness.send_replace(false);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let handles = self.ledger.close();
        if handles.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(_) => {
                spawn_release(Arc::clone(&self.platform), handles);
            }
            Err(_) => warn!(
                session_id = %self.id,
                count = handles.len(),
                "Session dropped outside a runtime, resources not released"
            ),
        }
    }
}
