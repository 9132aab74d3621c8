//! Interaction event producer
//!
//! Publishes like/view events for the statistics consumers. The caller waits for
//! the channel to accept the event, never for it to be aggregated. Exactly one
//! publish attempt is made; retrying is the caller's decision.

use async_trait::async_trait;
use event_schema::{EventKind, InteractionEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::channel::EventChannel;
use crate::error::{Result, StatisticsError};
use crate::metrics;

/// Resolves the current owner of a post
#[async_trait]
pub trait PostOwnerLookup: Send + Sync {
    /// `Ok(None)` when no such post exists. `Err` when the lookup itself failed.
    async fn post_owner(&self, post_id: &str) -> Result<Option<String>>;
}

/// Post ownership kept in memory
#[derive(Default)]
pub struct InMemoryPostDirectory {
    owners: RwLock<HashMap<String, String>>,
}

impl InMemoryPostDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, post_id: impl Into<String>, owner: impl Into<String>) {
        self.owners
            .write()
            .await
            .insert(post_id.into(), owner.into());
    }
}

#[async_trait]
impl PostOwnerLookup for InMemoryPostDirectory {
    async fn post_owner(&self, post_id: &str) -> Result<Option<String>> {
        Ok(self.owners.read().await.get(post_id).cloned())
    }
}

/// Topic names per event kind
#[derive(Debug, Clone)]
pub struct PublisherTopics {
    pub likes: String,
    pub views: String,
}

impl Default for PublisherTopics {
    fn default() -> Self {
        Self {
            likes: EventKind::Like.topic().to_string(),
            views: EventKind::View.topic().to_string(),
        }
    }
}

impl PublisherTopics {
    pub fn topic_for(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Like => &self.likes,
            EventKind::View => &self.views,
        }
    }
}

#[derive(Clone)]
pub struct InteractionPublisher {
    channel: Arc<dyn EventChannel>,
    owners: Arc<dyn PostOwnerLookup>,
    topics: PublisherTopics,
}

impl InteractionPublisher {
    pub fn new(
        channel: Arc<dyn EventChannel>,
        owners: Arc<dyn PostOwnerLookup>,
        topics: PublisherTopics,
    ) -> Self {
        Self {
            channel,
            owners,
            topics,
        }
    }

    /// Publish a like by `username` on `post_id`
    pub async fn like(&self, post_id: &str, username: &str) -> Result<InteractionEvent> {
        self.record(EventKind::Like, post_id, username).await
    }

    /// Publish a view by `username` of `post_id`
    pub async fn view(&self, post_id: &str, username: &str) -> Result<InteractionEvent> {
        self.record(EventKind::View, post_id, username).await
    }

    /// Resolve the post's owner and publish the resulting event.
    ///
    /// Nothing is published when the post does not exist or the lookup fails.
    pub async fn record(
        &self,
        kind: EventKind,
        post_id: &str,
        username: &str,
    ) -> Result<InteractionEvent> {
        if post_id.trim().is_empty() {
            return Err(StatisticsError::Validation("post id is empty".to_string()));
        }
        if username.trim().is_empty() {
            return Err(StatisticsError::Validation("username is empty".to_string()));
        }

        let author = self.owners.post_owner(post_id).await.map_err(|e| {
            warn!(post_id = %post_id, error = %e, "Failed to get post owner");
            match e {
                StatisticsError::OwnerLookup(_) => e,
                other => StatisticsError::OwnerLookup(other.to_string()),
            }
        })?;

        let author = author.ok_or_else(|| {
            warn!(post_id = %post_id, "Post not found, not publishing");
            StatisticsError::PostNotFound(post_id.to_string())
        })?;

        let event = InteractionEvent::new(post_id, author, username);
        self.publish_event(kind, &event).await?;
        Ok(event)
    }

    /// Serialize `event` and publish it to the topic for `kind`
    pub async fn publish_event(&self, kind: EventKind, event: &InteractionEvent) -> Result<()> {
        let topic = self.topics.topic_for(kind);
        let payload = event.to_payload()?;

        match self
            .channel
            .publish(topic, event.partition_key(), &payload)
            .await
        {
            Ok(()) => {
                metrics::record_published(kind.as_str(), "success");
                info!(
                    kind = %kind,
                    topic = %topic,
                    post_id = %event.post_id,
                    username = %event.username,
                    "Published interaction event"
                );
                Ok(())
            }
            Err(e) => {
                metrics::record_published(kind.as_str(), "error");
                warn!(
                    kind = %kind,
                    topic = %topic,
                    error = %e,
                    "Failed to publish interaction event"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelReader, MemoryChannel};

    struct FailingLookup;

    #[async_trait]
    impl PostOwnerLookup for FailingLookup {
        async fn post_owner(&self, _post_id: &str) -> Result<Option<String>> {
            Err(StatisticsError::Internal("post service unavailable".into()))
        }
    }

    async fn publisher_with(
        owners: Arc<dyn PostOwnerLookup>,
    ) -> (MemoryChannel, InteractionPublisher) {
        let channel = MemoryChannel::new();
        let publisher = InteractionPublisher::new(
            Arc::new(channel.clone()),
            owners,
            PublisherTopics::default(),
        );
        (channel, publisher)
    }

    #[tokio::test]
    async fn test_like_resolves_owner_and_publishes() {
        let directory = Arc::new(InMemoryPostDirectory::new());
        directory.insert("42", "alice").await;
        let (channel, publisher) = publisher_with(directory).await;

        let event = publisher.like("42", "bob").await.unwrap();
        assert_eq!(event, InteractionEvent::new("42", "alice", "bob"));

        let mut reader = channel.subscribe("likes", "test").await.unwrap();
        let msg = reader.read_next().await.unwrap();
        let decoded = InteractionEvent::from_payload(&msg.payload.unwrap()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(channel.len("views").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_post_publishes_nothing() {
        let (channel, publisher) = publisher_with(Arc::new(InMemoryPostDirectory::new())).await;

        assert!(matches!(
            publisher.view("9", "bob").await,
            Err(StatisticsError::PostNotFound(id)) if id == "9"
        ));
        assert!(matches!(
            publisher.like("9", "bob").await,
            Err(StatisticsError::PostNotFound(_))
        ));
        assert_eq!(channel.len("views").await, 0);
        assert_eq!(channel.len("likes").await, 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_publishes_nothing() {
        let (channel, publisher) = publisher_with(Arc::new(FailingLookup)).await;

        let result = publisher.like("42", "bob").await;
        assert!(matches!(result, Err(StatisticsError::OwnerLookup(_))));
        assert_eq!(channel.len("likes").await, 0);
    }

    #[tokio::test]
    async fn test_closed_channel_surfaces_error() {
        let (channel, publisher) = publisher_with(Arc::new(InMemoryPostDirectory::new())).await;
        channel.close();

        let result = publisher
            .publish_event(EventKind::Like, &InteractionEvent::new("1", "a", "b"))
            .await;
        assert!(matches!(result, Err(StatisticsError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_rejects_empty_username() {
        let (_, publisher) = publisher_with(Arc::new(InMemoryPostDirectory::new())).await;
        assert!(matches!(
            publisher.like("1", "").await,
            Err(StatisticsError::Validation(_))
        ));
    }
}
