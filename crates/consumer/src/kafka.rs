//! Kafka-backed event source with manual offset commits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::KafkaSettings;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};

use crate::{ConsumerError, EventSource, InboundRecord, Result};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads order events from a Kafka topic.
///
/// Auto-commit is disabled: the consumer decides when the cursor moves.
pub struct KafkaEventSource {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl KafkaEventSource {
    /// Creates a consumer in `group_id` and subscribes it to `topic`.
    pub fn new(settings: &KafkaSettings, group_id: &str, topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        let consumer: StreamConsumer = settings
            .client_config()
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[topic.as_str()])?;
        tracing::info!(%topic, group_id, brokers = %settings.brokers, "subscribed to order events");

        Ok(Self {
            consumer: Arc::new(consumer),
            topic,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn fetch(&self, timeout: Duration) -> Result<Option<InboundRecord>> {
        let message = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_elapsed) => return Ok(None),
            Ok(result) => result?,
        };

        Ok(Some(InboundRecord {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }

    async fn commit(&self, record: &InboundRecord) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &record.topic,
            record.partition,
            Offset::Offset(record.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let consumer = Arc::clone(&self.consumer);
        let brokers = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| ConsumerError::Unhealthy(e.to_string()))??;

        if brokers == 0 {
            return Err(ConsumerError::Unhealthy("no brokers available".to_string()));
        }
        Ok(())
    }
}
