//! Bluetooth advertisement channel.
//!
//! Broadcasts the alert payload so nearby devices without connectivity can
//! pick it up.

use async_trait::async_trait;
use quakeguard_core::types::AlertChannel;

use crate::channel::{ChannelContext, ChannelHandler};
use crate::error::ChannelError;

pub struct BluetoothHandler;

#[async_trait]
impl ChannelHandler for BluetoothHandler {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Bluetooth
    }

    async fn deliver(&self, ctx: ChannelContext) -> Result<(), ChannelError> {
        if ctx.request.payload.is_null() {
            return Err(ChannelError::MissingContent("payload"));
        }
        let handle = ctx.platform.start_advertising(&ctx.request.payload).await?;
        ctx.hold(handle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_support::{context, request};
    use crate::platform::TracingPlatform;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bluetooth_advertises_payload() {
        let platform = Arc::new(TracingPlatform::new());
        let (ctx, _tx, ledger) = context(AlertChannel::Bluetooth, request(), platform.clone());
        BluetoothHandler.deliver(ctx).await.unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_bluetooth_needs_payload() {
        let platform = Arc::new(TracingPlatform::new());
        let mut req = request();
        req.payload = serde_json::Value::Null;
        let (ctx, _tx, _ledger) = context(AlertChannel::Bluetooth, req, platform.clone());
        assert!(matches!(
            BluetoothHandler.deliver(ctx).await,
            Err(ChannelError::MissingContent("payload"))
        ));
    }
}
