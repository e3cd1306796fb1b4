//! Vibration channel: repeats the request's pattern until the session ends.

use std::time::Duration;

use async_trait::async_trait;
use quakeguard_core::types::AlertChannel;

use crate::channel::{ChannelContext, ChannelHandler};
use crate::error::ChannelError;

/// Used when the request carries no usable pattern. On/off in milliseconds.
pub const DEFAULT_PATTERN_MS: [u64; 2] = [500, 500];

pub struct VibrationHandler;

#[async_trait]
impl ChannelHandler for VibrationHandler {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Vibration
    }

    async fn deliver(&self, mut ctx: ChannelContext) -> Result<(), ChannelError> {
        let pattern = ctx
            .request
            .vibration_pattern
            .clone()
            .filter(|p| p.iter().any(|ms| *ms > 0))
            .unwrap_or_else(|| DEFAULT_PATTERN_MS.to_vec());

        'session: while ctx.is_live() {
            // Even slots vibrate, odd slots are silence.
            for (slot, ms) in pattern.iter().enumerate() {
                if slot % 2 == 0 && *ms > 0 {
                    ctx.platform.vibrate(*ms).await?;
                }
                if !ctx.pause(Duration::from_millis(*ms)).await {
                    break 'session;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_support::{context, request};
    use crate::platform::TracingPlatform;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_pattern_repeats_until_session_ends() {
        let platform = Arc::new(TracingPlatform::new());
        let mut req = request();
        req.vibration_pattern = Some(vec![200, 300]);
        let (ctx, tx, _ledger) = context(AlertChannel::Vibration, req, platform.clone());

        let task = tokio::spawn(async move { VibrationHandler.deliver(ctx).await });
        // Pulses at 0, 500, 1000, 1500 ms.
        tokio::time::sleep(Duration::from_millis(1600)).await;
        tx.send_replace(false);
        task.await.unwrap().unwrap();

        assert_eq!(platform.pulses(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pattern_uses_default() {
        let platform = Arc::new(TracingPlatform::new());
        let mut req = request();
        req.vibration_pattern = Some(vec![0, 0]);
        let (ctx, tx, _ledger) = context(AlertChannel::Vibration, req, platform.clone());

        let task = tokio::spawn(async move { VibrationHandler.deliver(ctx).await });
        tokio::time::sleep(Duration::from_millis(1200)).await;
        tx.send_replace(false);
        task.await.unwrap().unwrap();

        // Default 500/500: pulses at 0 and 1000 ms.
        assert_eq!(platform.pulses(), 2);
    }
}
