//! Kafka-backed channel

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{ChannelMessage, ChannelReader, EventChannel};
use crate::config::KafkaConfig;
use crate::error::{Result, StatisticsError};

/// Configuration for the Kafka channel
#[derive(Debug, Clone)]
pub struct KafkaChannelConfig {
    /// Kafka brokers (comma-separated)
    pub brokers: String,
    /// Producer client id
    pub client_id: String,
    /// Max time a publish may sit in the producer queue
    pub publish_timeout: Duration,
}

impl From<&KafkaConfig> for KafkaChannelConfig {
    fn from(config: &KafkaConfig) -> Self {
        Self {
            brokers: config.brokers.clone(),
            client_id: "statistics-service".to_string(),
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
        }
    }
}

pub struct KafkaChannel {
    producer: FutureProducer,
    config: KafkaChannelConfig,
}

impl KafkaChannel {
    pub fn new(config: KafkaChannelConfig) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            // Idempotency and reliability settings
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .set("linger.ms", "5")
            .create::<FutureProducer>()
            .map_err(|e| {
                error!("Failed to create Kafka producer: {}", e);
                StatisticsError::from(e)
            })?;

        info!(brokers = %config.brokers, "Kafka channel initialized");

        Ok(Self { producer, config })
    }
}

#[async_trait]
impl EventChannel for KafkaChannel {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, self.config.publish_timeout)
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    topic = %topic,
                    partition,
                    offset,
                    "Published message to Kafka"
                );
                Ok(())
            }
            Err((err, _)) => {
                warn!(error = ?err, topic = %topic, "Failed to publish message to Kafka");
                Err(StatisticsError::Channel(format!(
                    "Failed to publish to {}: {}",
                    topic, err
                )))
            }
        }
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn ChannelReader>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                error!("Failed to create Kafka consumer: {}", e);
                StatisticsError::from(e)
            })?;

        consumer.subscribe(&[topic]).map_err(|e| {
            error!("Failed to subscribe to topic {}: {}", topic, e);
            StatisticsError::from(e)
        })?;

        info!(topic = %topic, group_id = %group_id, "Kafka reader subscribed");

        Ok(Box::new(KafkaReader { consumer }))
    }
}

struct KafkaReader {
    consumer: StreamConsumer,
}

#[async_trait]
impl ChannelReader for KafkaReader {
    async fn read_next(&mut self) -> Result<ChannelMessage> {
        let msg = self.consumer.recv().await?;

        Ok(ChannelMessage {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            payload: msg.payload().map(|p| p.to_vec()),
        })
    }
}
