//! Publish error types.

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors that can occur while emitting a notification.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker rejected or timed out the delivery.
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// The payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The publisher refused the notification.
    #[error("Publish rejected: {0}")]
    Rejected(String),
}
