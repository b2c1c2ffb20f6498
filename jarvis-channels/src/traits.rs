use crate::types::{InboundMessage, OutboundMessage};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Unique channel identifier, e.g. "console".
    fn channel_id(&self) -> &str;

    /// Start receiving messages. Push to tx for each inbound message; dropping
    /// tx signals that this channel has no more input.
    async fn start(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()>;

    /// Deliver a message to a specific user on this channel.
    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()>;
}
