//! LED channel: blinks until the session ends, then switches off.

use std::time::Duration;

use async_trait::async_trait;
use quakeguard_core::types::AlertChannel;

use crate::channel::{ChannelContext, ChannelHandler};
use crate::error::ChannelError;

pub struct LedHandler {
    half_period: Duration,
}

impl LedHandler {
    pub fn new(half_period: Duration) -> Self {
        Self { half_period }
    }

    async fn blink(&self, ctx: &mut ChannelContext) -> Result<(), ChannelError> {
        loop {
            ctx.platform.set_led(true).await?;
            if !ctx.pause(self.half_period).await {
                return Ok(());
            }
            ctx.platform.set_led(false).await?;
            if !ctx.pause(self.half_period).await {
                return Ok(());
            }
        }
    }
}

impl Default for LedHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl ChannelHandler for LedHandler {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Led
    }

    async fn deliver(&self, mut ctx: ChannelContext) -> Result<(), ChannelError> {
        let result = self.blink(&mut ctx).await;
        if let Err(e) = ctx.platform.set_led(false).await {
            tracing::debug!(error = %e, "Failed to switch LED off");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_support::{context, request};
    use crate::platform::{AlertPlatform, PlatformHandle, TracingPlatform};
    use quakeguard_core::types::AlertPriority;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Records LED states, delegating everything else.
    #[derive(Default)]
    struct LedRecorder {
        inner: TracingPlatform,
        states: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl AlertPlatform for LedRecorder {
        async fn show_notification(
            &self,
            title: &str,
            body: &str,
            priority: AlertPriority,
            payload: &Value,
        ) -> Result<PlatformHandle, ChannelError> {
            self.inner.show_notification(title, body, priority, payload).await
        }
        async fn show_full_screen(
            &self,
            title: &str,
            body: &str,
        ) -> Result<PlatformHandle, ChannelError> {
            self.inner.show_full_screen(title, body).await
        }
        async fn play_sound(&self, sound: Option<&str>) -> Result<PlatformHandle, ChannelError> {
            self.inner.play_sound(sound).await
        }
        async fn vibrate(&self, duration_ms: u64) -> Result<(), ChannelError> {
            self.inner.vibrate(duration_ms).await
        }
        async fn set_led(&self, on: bool) -> Result<(), ChannelError> {
            self.states.lock().unwrap().push(on);
            Ok(())
        }
        async fn speak(&self, text: &str) -> Result<PlatformHandle, ChannelError> {
            self.inner.speak(text).await
        }
        async fn start_advertising(&self, payload: &Value) -> Result<PlatformHandle, ChannelError> {
            self.inner.start_advertising(payload).await
        }
        async fn release(&self, handle: PlatformHandle) {
            self.inner.release(handle).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blinks_and_ends_dark() {
        let platform = Arc::new(LedRecorder::default());
        let (ctx, tx, _ledger) = context(AlertChannel::Led, request(), platform.clone());

        let task = tokio::spawn(async move { LedHandler::default().deliver(ctx).await });
        tokio::time::sleep(Duration::from_millis(1250)).await;
        tx.send_replace(false);
        task.await.unwrap().unwrap();

        let states = platform.states.lock().unwrap().clone();
        // on 0, off 500, on 1000, then the final switch-off.
        assert_eq!(states, vec![true, false, true, false]);
    }
}
