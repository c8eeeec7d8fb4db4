//! Consumer error types.

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors raised by event sources.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The Kafka client reported an error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// The stream connection or its metadata cannot be reached.
    #[error("Event source unhealthy: {0}")]
    Unhealthy(String),
}

/// An inbound payload that could not be turned into an order event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON for an order event.
    #[error("Malformed order event: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed but violates an event invariant.
    #[error("Invalid order event: {0}")]
    Invalid(String),
}

/// Result type for event source operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;
