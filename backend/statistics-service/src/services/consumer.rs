use event_schema::{EventKind, InteractionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dead_letter::{DeadLetter, DeadLetterReason, DeadLetterSink};
use crate::channel::{ChannelMessage, ChannelReader, EventChannel};
use crate::error::{Result, StatisticsError};
use crate::metrics;
use crate::store::AggregateStore;

/// Interaction consumer configuration
#[derive(Debug, Clone)]
pub struct InteractionConsumerConfig {
    /// Consumer group ID
    pub group_id: String,
    /// Topic carrying likes
    pub likes_topic: String,
    /// Topic carrying views
    pub views_topic: String,
    /// Pause after a failed channel read
    pub retry_backoff: Duration,
}

impl Default for InteractionConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "statistics-service".to_string(),
            likes_topic: EventKind::Like.topic().to_string(),
            views_topic: EventKind::View.topic().to_string(),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl InteractionConsumerConfig {
    pub fn topic_for(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Like => &self.likes_topic,
            EventKind::View => &self.views_topic,
        }
    }
}

/// What a consumer loop did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub applied: u64,
    pub malformed: u64,
    pub write_failures: u64,
    pub read_errors: u64,
}

enum Outcome {
    Applied,
    Malformed,
    WriteFailed,
}

/// Interaction consumer
///
/// Drains one event kind's topic into that kind's aggregate table for the
/// lifetime of the process.
///
/// # Per-message policy
/// - Undecodable payloads are dropped and never retried
/// - A failed insert drops the event for this delivery and moves on
/// - Neither stops the loop; only shutdown or a closed channel does
pub struct InteractionConsumer {
    kind: EventKind,
    reader: Box<dyn ChannelReader>,
    store: Arc<dyn AggregateStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    shutdown_rx: watch::Receiver<bool>,
    retry_backoff: Duration,
    report: ConsumerReport,
}

impl InteractionConsumer {
    pub fn new(
        kind: EventKind,
        reader: Box<dyn ChannelReader>,
        store: Arc<dyn AggregateStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        shutdown_rx: watch::Receiver<bool>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            kind,
            reader,
            store,
            dead_letters,
            shutdown_rx,
            retry_backoff,
            report: ConsumerReport::default(),
        }
    }

    /// Subscribe to `kind`'s topic and build a consumer for it
    pub async fn subscribe(
        kind: EventKind,
        channel: &dyn EventChannel,
        config: &InteractionConsumerConfig,
        store: Arc<dyn AggregateStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let topic = config.topic_for(kind);
        let reader = channel.subscribe(topic, &config.group_id).await?;

        info!(
            kind = %kind,
            topic = %topic,
            group_id = %config.group_id,
            "Interaction consumer subscribed"
        );

        Ok(Self::new(
            kind,
            reader,
            store,
            dead_letters,
            shutdown_rx,
            config.retry_backoff,
        ))
    }

    /// Run the consumer loop until shutdown is signalled or the channel closes
    pub async fn run(mut self) -> ConsumerReport {
        info!(kind = %self.kind, "Starting interaction consumer loop");

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!(kind = %self.kind, "Shutdown signal received, stopping consumer");
                        break;
                    }
                }

                message = self.reader.read_next() => {
                    match message {
                        Ok(msg) => self.handle(msg).await,
                        Err(StatisticsError::ChannelClosed) => {
                            warn!(kind = %self.kind, "Channel closed, stopping consumer");
                            break;
                        }
                        Err(e) => {
                            self.report.read_errors += 1;
                            error!(kind = %self.kind, error = %e, "Failed to read message");
                            self.backoff().await;
                        }
                    }
                }
            }
        }

        info!(kind = %self.kind, report = ?self.report, "Interaction consumer stopped");
        self.report
    }

    /// Sleep before the next read, waking early on shutdown
    async fn backoff(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(self.retry_backoff) => {}
            _ = self.shutdown_rx.changed() => {}
        }
    }

    async fn handle(&mut self, msg: ChannelMessage) {
        debug!(
            kind = %self.kind,
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            "Received interaction message"
        );

        let outcome = self.apply(&msg).await;
        let label = match outcome {
            Outcome::Applied => {
                self.report.applied += 1;
                "applied"
            }
            Outcome::Malformed => {
                self.report.malformed += 1;
                "malformed"
            }
            Outcome::WriteFailed => {
                self.report.write_failures += 1;
                "write_failed"
            }
        };
        metrics::record_consumed(self.kind.as_str(), label);
    }

    async fn apply(&self, msg: &ChannelMessage) -> Outcome {
        let event = match msg.payload.as_deref() {
            None => {
                warn!(kind = %self.kind, offset = msg.offset, "Message has no payload, skipping");
                self.dead_letter(msg, DeadLetterReason::Malformed, "empty payload")
                    .await;
                return Outcome::Malformed;
            }
            Some(payload) => match InteractionEvent::from_payload(payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        kind = %self.kind,
                        offset = msg.offset,
                        error = %e,
                        "Failed to deserialize message, skipping"
                    );
                    self.dead_letter(msg, DeadLetterReason::Malformed, e.to_string())
                        .await;
                    return Outcome::Malformed;
                }
            },
        };

        match self.store.insert(self.kind, &event).await {
            Ok(()) => {
                debug!(
                    kind = %self.kind,
                    post_id = %event.post_id,
                    username = %event.username,
                    "Applied interaction event"
                );
                Outcome::Applied
            }
            Err(e) => {
                error!(
                    kind = %self.kind,
                    post_id = %event.post_id,
                    error = %e,
                    "Failed to write {}",
                    self.kind.table()
                );
                self.dead_letter(msg, DeadLetterReason::StorageWrite, e.to_string())
                    .await;
                Outcome::WriteFailed
            }
        }
    }

    async fn dead_letter(
        &self,
        msg: &ChannelMessage,
        reason: DeadLetterReason,
        error: impl Into<String>,
    ) {
        metrics::record_dead_letter(self.kind.as_str(), reason.as_str());
        let letter = DeadLetter::new(self.kind, msg, reason, error);
        if let Err(e) = self.dead_letters.send(letter).await {
            warn!(kind = %self.kind, error = %e, "Dead-letter sink failed");
        }
    }
}

/// Spawn one consumer task per event kind.
///
/// Each kind gets its own reader and task, so a stalled or failing loop never
/// holds up the other.
pub async fn spawn_consumers(
    channel: &dyn EventChannel,
    config: &InteractionConsumerConfig,
    store: Arc<dyn AggregateStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<Vec<(EventKind, JoinHandle<ConsumerReport>)>> {
    let mut handles = Vec::with_capacity(EventKind::ALL.len());

    for kind in EventKind::ALL {
        let consumer = InteractionConsumer::subscribe(
            kind,
            channel,
            config,
            Arc::clone(&store),
            Arc::clone(&dead_letters),
            shutdown_rx.clone(),
        )
        .await?;

        handles.push((kind, tokio::spawn(consumer.run())));
    }

    Ok(handles)
}
