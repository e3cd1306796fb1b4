//! The device capability seam.
//!
//! Channel handlers never touch hardware directly; everything goes through
//! an [`AlertPlatform`]. Capabilities that keep running until stopped
//! (notifications, looping sounds, speech, advertising) return a
//! [`PlatformHandle`] that must eventually be passed to `release`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use quakeguard_core::types::{AlertChannel, AlertPriority};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ChannelError;

/// A platform resource held by an alert session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlatformHandle {
    pub id: u64,
    pub channel: AlertChannel,
}

#[async_trait]
pub trait AlertPlatform: Send + Sync {
    async fn show_notification(
        &self,
        title: &str,
        body: &str,
        priority: AlertPriority,
        payload: &Value,
    ) -> Result<PlatformHandle, ChannelError>;

    async fn show_full_screen(&self, title: &str, body: &str)
        -> Result<PlatformHandle, ChannelError>;

    /// Start a looping alarm. `None` plays the platform's default alarm tone.
    async fn play_sound(&self, sound: Option<&str>) -> Result<PlatformHandle, ChannelError>;

    /// One vibration pulse of `duration_ms`. Returns once the pulse is issued.
    async fn vibrate(&self, duration_ms: u64) -> Result<(), ChannelError>;

    async fn set_led(&self, on: bool) -> Result<(), ChannelError>;

    async fn speak(&self, text: &str) -> Result<PlatformHandle, ChannelError>;

    async fn start_advertising(&self, payload: &Value) -> Result<PlatformHandle, ChannelError>;

    /// Stop and free a resource. Releasing an unknown handle is a no-op.
    async fn release(&self, handle: PlatformHandle);
}

/// Headless platform that logs every capability call.
///
/// Used by the binary where no device integration exists, and by tests to
/// check that every acquired handle is released.
#[derive(Debug, Default)]
pub struct TracingPlatform {
    next_id: AtomicU64,
    live: Mutex<HashSet<PlatformHandle>>,
    acquired: AtomicU64,
    pulses: AtomicU64,
}

impl TracingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.lock_live().len()
    }

    /// Total handles ever acquired.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Vibration pulses issued.
    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::SeqCst)
    }

    pub fn is_live(&self, handle: PlatformHandle) -> bool {
        self.lock_live().contains(&handle)
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, HashSet<PlatformHandle>> {
        match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn acquire(&self, channel: AlertChannel) -> PlatformHandle {
        let handle = PlatformHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            channel,
        };
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.lock_live().insert(handle);
        handle
    }
}

#[async_trait]
impl AlertPlatform for TracingPlatform {
    async fn show_notification(
        &self,
        title: &str,
        body: &str,
        priority: AlertPriority,
        _payload: &Value,
    ) -> Result<PlatformHandle, ChannelError> {
        let handle = self.acquire(AlertChannel::Push);
        info!(handle = handle.id, %priority, title, body, "Notification posted");
        Ok(handle)
    }

    async fn show_full_screen(
        &self,
        title: &str,
        body: &str,
    ) -> Result<PlatformHandle, ChannelError> {
        let handle = self.acquire(AlertChannel::FullScreen);
        info!(handle = handle.id, title, body, "Full-screen alert shown");
        Ok(handle)
    }

    async fn play_sound(&self, sound: Option<&str>) -> Result<PlatformHandle, ChannelError> {
        let handle = self.acquire(AlertChannel::AlarmSound);
        info!(handle = handle.id, sound = sound.unwrap_or("default"), "Alarm sound started");
        Ok(handle)
    }

    async fn vibrate(&self, duration_ms: u64) -> Result<(), ChannelError> {
        self.pulses.fetch_add(1, Ordering::SeqCst);
        debug!(duration_ms, "Vibration pulse");
        Ok(())
    }

    async fn set_led(&self, on: bool) -> Result<(), ChannelError> {
        debug!(on, "LED set");
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<PlatformHandle, ChannelError> {
        let handle = self.acquire(AlertChannel::Tts);
        info!(handle = handle.id, text, "Speech started");
        Ok(handle)
    }

    async fn start_advertising(&self, payload: &Value) -> Result<PlatformHandle, ChannelError> {
        let handle = self.acquire(AlertChannel::Bluetooth);
        info!(handle = handle.id, payload = %payload, "Bluetooth advertisement started");
        Ok(handle)
    }

    async fn release(&self, handle: PlatformHandle) {
        if self.lock_live().remove(&handle) {
            info!(handle = handle.id, channel = %handle.channel, "Platform resource released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_platform_tracks_handles() {
        let platform = TracingPlatform::new();
        let a = platform
            .show_notification("t", "b", AlertPriority::High, &Value::Null)
            .await
            .unwrap();
        let b = platform.play_sound(None).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(b.channel, AlertChannel::AlarmSound);
        assert_eq!(platform.outstanding(), 2);

        platform.release(a).await;
        platform.release(a).await;
        assert_eq!(platform.outstanding(), 1);
        assert!(!platform.is_live(a));
        assert!(platform.is_live(b));
        assert_eq!(platform.acquired(), 2);
    }

    #[tokio::test]
    async fn test_pulses_are_counted_without_handles() {
        let platform = TracingPlatform::new();
        platform.vibrate(300).await.unwrap();
        platform.vibrate(300).await.unwrap();
        platform.set_led(true).await.unwrap();
        assert_eq!(platform.pulses(), 2);
        assert_eq!(platform.outstanding(), 0);
    }
}
