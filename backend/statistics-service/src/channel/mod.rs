//! Durable log channel
//!
//! An append-only, replayable message channel per event kind. Delivery is
//! at-least-once per consumer group; nothing is ordered across partitions.

use async_trait::async_trait;

use crate::error::Result;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(feature = "kafka")]
pub use kafka::{KafkaChannel, KafkaChannelConfig};
pub use memory::MemoryChannel;

/// One delivered message
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Append `payload` to `topic`. Returns once the channel has accepted it.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()>;

    /// Open a reader on `topic` that tracks its progress under `group_id`
    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn ChannelReader>>;
}

#[async_trait]
pub trait ChannelReader: Send + Sync {
    /// Block until the next message is available.
    ///
    /// Fails with `StatisticsError::ChannelClosed` once the channel is closed.
    async fn read_next(&mut self) -> Result<ChannelMessage>;
}
