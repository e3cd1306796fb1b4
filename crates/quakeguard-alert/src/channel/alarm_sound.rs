//! Looping alarm sound channel.

use async_trait::async_trait;
use quakeguard_core::types::AlertChannel;

use crate::channel::{ChannelContext, ChannelHandler};
use crate::error::ChannelError;

/// Starts the alarm; it loops on the platform until the session releases it.
pub struct AlarmSoundHandler;

#[async_trait]
impl ChannelHandler for AlarmSoundHandler {
    fn channel(&self) -> AlertChannel {
        AlertChannel::AlarmSound
    }

    async fn deliver(&self, ctx: ChannelContext) -> Result<(), ChannelError> {
        let handle = ctx
            .platform
            .play_sound(ctx.request.custom_sound.as_deref())
            .await?;
        ctx.hold(handle).await;
        Ok(())
    }
}
