//! Text-to-speech channel.

use async_trait::async_trait;
use quakeguard_core::types::AlertChannel;

use crate::channel::{ChannelContext, ChannelHandler};
use crate::error::ChannelError;

pub struct TtsHandler;

#[async_trait]
impl ChannelHandler for TtsHandler {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Tts
    }

    async fn deliver(&self, ctx: ChannelContext) -> Result<(), ChannelError> {
        let text = ctx
            .request
            .speech_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ChannelError::MissingContent("speech text"))?;
        let handle = ctx.platform.speak(text).await?;
        ctx.hold(handle).await;
        Ok(())
    }
}
