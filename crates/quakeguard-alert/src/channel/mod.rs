//! Channel handler registry and trait definition.
//!
//! Defines the `ChannelHandler` async trait and the registry the
//! orchestrator uses to dispatch each enabled channel of an alert.

pub mod alarm_sound;
pub mod bluetooth;
pub mod full_screen;
pub mod led;
pub mod push;
pub mod tts;
pub mod vibration;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quakeguard_core::types::{AlertChannel, AlertRequest};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::ChannelError;
use crate::platform::{AlertPlatform, PlatformHandle};
use crate::session::ResourceLedger;

pub use alarm_sound::AlarmSoundHandler;
pub use bluetooth::BluetoothHandler;
pub use full_screen::FullScreenHandler;
pub use led::LedHandler;
pub use push::PushHandler;
pub use tts::TtsHandler;
pub use vibration::VibrationHandler;

/// What a handler runs with: the request, the platform, and the session's
/// ledger and liveness signal.
pub struct ChannelContext {
    pub session_id: Uuid,
    pub channel: AlertChannel,
    pub request: Arc<AlertRequest>,
    pub platform: Arc<dyn AlertPlatform>,
    pub ledger: Arc<ResourceLedger>,
    pub liveness: watch::Receiver<bool>,
}

impl ChannelContext {
    pub fn is_live(&self) -> bool {
        *self.liveness.borrow()
    }

    /// Hand `handle` to the session. If the session has already been torn
    /// down the handle is released here and `false` is returned.
    pub async fn hold(&self, handle: PlatformHandle) -> bool {
        if self.ledger.track(handle) {
            true
        } else {
            self.platform.release(handle).await;
            false
        }
    }

    /// Sleep for `duration` or until the session ends, whichever is first.
    /// Returns whether the session is still live.
    pub async fn pause(&mut self, duration: Duration) -> bool {
        let ended = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.liveness.wait_for(|live| !*live) => true,
        };
        !ended && self.is_live()
    }
}

/// Delivers one alert over one channel.
///
/// One-shot handlers return after acquiring their resource; looping
/// handlers (vibration, LED) return once the session ends.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    fn channel(&self) -> AlertChannel;

    async fn deliver(&self, ctx: ChannelContext) -> Result<(), ChannelError>;
}

/// Maps each channel to its handler.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    handlers: HashMap<AlertChannel, Arc<dyn ChannelHandler>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in handler for every channel.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ChannelHandler>) {
        self.handlers.insert(handler.channel(), handler);
    }

    pub fn register_defaults(&mut self) {
        self.register(Arc::new(PushHandler));
        self.register(Arc::new(FullScreenHandler));
        self.register(Arc::new(AlarmSoundHandler));
        self.register(Arc::new(VibrationHandler));
        self.register(Arc::new(LedHandler::default()));
        self.register(Arc::new(TtsHandler));
        self.register(Arc::new(BluetoothHandler));
    }

    pub fn get(&self, channel: AlertChannel) -> Option<Arc<dyn ChannelHandler>> {
        self.handlers.get(&channel).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use quakeguard_core::types::{AlertPriority, ChannelSet};

    /// A context over a fresh ledger plus the sender that ends it.
    pub fn context(
        channel: AlertChannel,
        request: AlertRequest,
        platform: Arc<dyn AlertPlatform>,
    ) -> (ChannelContext, watch::Sender<bool>, Arc<ResourceLedger>) {
        let (tx, rx) = watch::channel(true);
        let ledger = Arc::new(ResourceLedger::new());
        let ctx = ChannelContext {
            session_id: Uuid::new_v4(),
            channel,
            request: Arc::new(request),
            platform,
            ledger: Arc::clone(&ledger),
            liveness: rx,
        };
        (ctx, tx, ledger)
    }

    pub fn request() -> AlertRequest {
        let mut request = AlertRequest::new(
            "Earthquake",
            "Strong shaking in 4 s",
            AlertPriority::Critical,
            ChannelSet::all(),
        );
        request.speech_text = Some("Earthquake. Take cover.".into());
        request.payload = serde_json::json!({"event_id": "e1"});
        request
    }
}
