//! Full-screen takeover channel.

use async_trait::async_trait;
use quakeguard_core::types::AlertChannel;

use crate::channel::{ChannelContext, ChannelHandler};
use crate::error::ChannelError;

pub struct FullScreenHandler;

#[async_trait]
impl ChannelHandler for FullScreenHandler {
    fn channel(&self) -> AlertChannel {
        AlertChannel::FullScreen
    }

    async fn deliver(&self, ctx: ChannelContext) -> Result<(), ChannelError> {
        let handle = ctx
            .platform
            .show_full_screen(&ctx.request.title, &ctx.request.body)
            .await?;
        ctx.hold(handle).await;
        Ok(())
    }
}
