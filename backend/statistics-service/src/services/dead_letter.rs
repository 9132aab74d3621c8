//! Dead-letter sinks
//!
//! Consumer loops never retry or block on a bad message. Whatever they drop is
//! handed to a `DeadLetterSink` so it can be inspected or replayed later.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_schema::EventKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::channel::{ChannelMessage, EventChannel};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// Payload missing or not a valid interaction event
    Malformed,
    /// Event decoded but the aggregate insert failed
    StorageWrite,
}

impl DeadLetterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterReason::Malformed => "malformed",
            DeadLetterReason::StorageWrite => "storage_write",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: Uuid,
    pub kind: EventKind,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub reason: DeadLetterReason,
    pub error: String,
    /// Original payload, lossily decoded as UTF-8
    pub payload: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        kind: EventKind,
        message: &ChannelMessage,
        reason: DeadLetterReason,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason,
            error: error.into(),
            payload: message
                .payload
                .as_deref()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default(),
            failed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, letter: DeadLetter) -> Result<()>;
}

/// Records dropped messages in the log only
#[derive(Debug, Default, Clone)]
pub struct LogDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<()> {
        warn!(
            kind = %letter.kind,
            topic = %letter.topic,
            partition = letter.partition,
            offset = letter.offset,
            reason = letter.reason.as_str(),
            error = %letter.error,
            "Dropped interaction event"
        );
        Ok(())
    }
}

/// Publishes dropped messages as JSON to a dead-letter topic
pub struct ChannelDeadLetterSink {
    channel: Arc<dyn EventChannel>,
    topic: String,
}

impl ChannelDeadLetterSink {
    pub fn new(channel: Arc<dyn EventChannel>, topic: impl Into<String>) -> Self {
        Self {
            channel,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl DeadLetterSink for ChannelDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<()> {
        let payload = serde_json::to_vec(&letter)?;
        let key = format!("{}-{}", letter.topic, letter.offset);

        self.channel.publish(&self.topic, &key, &payload).await?;

        debug!(
            dead_letter_topic = %self.topic,
            id = %letter.id,
            reason = letter.reason.as_str(),
            "Sent dropped event to dead-letter topic"
        );
        Ok(())
    }
}

/// Keeps dropped messages in memory
#[derive(Default, Clone)]
pub struct InMemoryDeadLetterSink {
    letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().await.clone()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<()> {
        self.letters.lock().await.push(letter);
        Ok(())
    }
}
