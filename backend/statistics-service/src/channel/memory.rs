//! In-process channel
//!
//! Single partition per topic, one offset per (topic, group). Messages are never
//! removed, so a group can be rewound to replay them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use super::{ChannelMessage, ChannelReader, EventChannel};
use crate::error::{Result, StatisticsError};

#[derive(Default)]
struct TopicLog {
    messages: Vec<Vec<u8>>,
    group_offsets: HashMap<String, usize>,
}

struct Inner {
    topics: Mutex<HashMap<String, TopicLog>>,
    closed: AtomicBool,
    // Bumped on every append and on close to wake blocked readers
    version: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct MemoryChannel {
    inner: Arc<Inner>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                topics: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                version,
            }),
        }
    }

    /// Close the channel. Pending and future reads fail with `ChannelClosed`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.version.send_modify(|v| *v += 1);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of messages ever appended to `topic`
    pub async fn len(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .await
            .get(topic)
            .map(|log| log.messages.len())
            .unwrap_or(0)
    }

    /// Next offset `group_id` will read from `topic`
    pub async fn committed_offset(&self, topic: &str, group_id: &str) -> usize {
        self.inner
            .topics
            .lock()
            .await
            .get(topic)
            .and_then(|log| log.group_offsets.get(group_id).copied())
            .unwrap_or(0)
    }

    /// Move `group_id` back to `offset` so the following messages are delivered again
    pub async fn rewind(&self, topic: &str, group_id: &str, offset: usize) {
        let mut topics = self.inner.topics.lock().await;
        let log = topics.entry(topic.to_string()).or_default();
        let offset = offset.min(log.messages.len());
        log.group_offsets.insert(group_id.to_string(), offset);
        drop(topics);

        debug!(topic = %topic, group_id = %group_id, offset, "Rewound consumer group");
        self.inner.version.send_modify(|v| *v += 1);
    }
}

#[async_trait]
impl EventChannel for MemoryChannel {
    async fn publish(&self, topic: &str, _key: &str, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(StatisticsError::ChannelClosed);
        }

        self.inner
            .topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .messages
            .push(payload.to_vec());

        self.inner.version.send_modify(|v| *v += 1);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn ChannelReader>> {
        if self.is_closed() {
            return Err(StatisticsError::ChannelClosed);
        }

        self.inner
            .topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_default();

        Ok(Box::new(MemoryReader {
            inner: Arc::clone(&self.inner),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            version_rx: self.inner.version.subscribe(),
        }))
    }
}

struct MemoryReader {
    inner: Arc<Inner>,
    topic: String,
    group_id: String,
    version_rx: watch::Receiver<u64>,
}

#[async_trait]
impl ChannelReader for MemoryReader {
    async fn read_next(&mut self) -> Result<ChannelMessage> {
        loop {
            // Mark the current version as seen before looking, so an append that
            // races with this check still wakes the `changed()` below.
            self.version_rx.borrow_and_update();

            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(StatisticsError::ChannelClosed);
            }

            {
                let mut topics = self.inner.topics.lock().await;
                let log = topics.entry(self.topic.clone()).or_default();
                let offset = log.group_offsets.get(&self.group_id).copied().unwrap_or(0);

                if let Some(payload) = log.messages.get(offset).cloned() {
                    log.group_offsets.insert(self.group_id.clone(), offset + 1);
                    return Ok(ChannelMessage {
                        topic: self.topic.clone(),
                        partition: 0,
                        offset: offset as i64,
                        payload: Some(payload),
                    });
                }
            }

            self.version_rx
                .changed()
                .await
                .map_err(|_| StatisticsError::ChannelClosed)?;
        }
    }
}
