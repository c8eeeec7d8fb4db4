//! Kafka-backed publisher.

use std::time::Duration;

use async_trait::async_trait;
use common::KafkaSettings;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;

use crate::{CompensationNotice, CompensationPublisher, PublishError, StockDeductedEvent};

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes notices as JSON records keyed by order or product ID.
///
/// Stock-deducted events are only sent when a topic has been configured
/// for them.
pub struct KafkaCompensationPublisher {
    producer: FutureProducer,
    topic: String,
    stock_deducted_topic: Option<String>,
    timeout: Duration,
}

impl KafkaCompensationPublisher {
    /// Creates a publisher writing compensation notices to `topic`.
    pub fn new(settings: &KafkaSettings, topic: impl Into<String>) -> Result<Self, PublishError> {
        let producer: FutureProducer = settings
            .client_config()
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.into(),
            stock_deducted_topic: None,
            timeout: DEFAULT_SEND_TIMEOUT,
        })
    }

    /// Also publish successful deductions to `topic`.
    #[must_use]
    pub fn with_stock_deducted_topic(mut self, topic: impl Into<String>) -> Self {
        self.stock_deducted_topic = Some(topic.into());
        self
    }

    /// Sets how long a send may wait for queue space.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn send_json<T: Serialize + Sync>(
        &self,
        topic: &str,
        key: &str,
        payload: &T,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(payload)?;
        let record = FutureRecord::to(topic).key(key).payload(&payload);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map_err(|(err, _)| PublishError::Kafka(err))?;

        tracing::debug!(topic, key, "notification delivered");
        Ok(())
    }
}

#[async_trait]
impl CompensationPublisher for KafkaCompensationPublisher {
    async fn publish_stock_deduction_failed(
        &self,
        notice: &CompensationNotice,
    ) -> Result<(), PublishError> {
        let key = notice.order_id.to_string();
        self.send_json(&self.topic, &key, notice).await
    }

    async fn publish_stock_deducted(&self, event: &StockDeductedEvent) -> Result<(), PublishError> {
        match &self.stock_deducted_topic {
            Some(topic) => {
                self.send_json(topic, event.product_id.as_str(), event)
                    .await
            }
            None => Ok(()),
        }
    }
}
