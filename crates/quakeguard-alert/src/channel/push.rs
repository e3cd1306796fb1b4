//! Push notification channel.

use async_trait::async_trait;
use quakeguard_core::types::AlertChannel;

use crate::channel::{ChannelContext, ChannelHandler};
use crate::error::ChannelError;

/// Posts a system notification carrying the alert payload.
pub struct PushHandler;

#[async_trait]
impl ChannelHandler for PushHandler {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Push
    }

    async fn deliver(&self, ctx: ChannelContext) -> Result<(), ChannelError> {
        let request = &ctx.request;
        if request.title.is_empty() {
            return Err(ChannelError::MissingContent("title"));
        }
        let handle = ctx
            .platform
            .show_notification(&request.title, &request.body, request.priority, &request.payload)
            .await?;
        ctx.hold(handle).await;
        Ok(())
    }
}
