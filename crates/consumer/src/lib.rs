//! Order-event consumer for the stock ledger.
//!
//! This crate turns order events from a message stream into stock deductions:
//! - [`EventSource`] abstracts the stream (Kafka or in-memory) and its cursor
//! - [`OrderEvent`] is the decoded inbound payload
//! - [`EventConsumer`] runs the fetch, decode, apply and commit cycle and
//!   emits compensation notices for failed line items
//! - [`CommitPolicy`] selects between advance-always and idempotent retry

mod applied;
pub mod consumer;
pub mod error;
pub mod event;
pub mod kafka;
pub mod memory;
pub mod policy;
pub mod source;
pub mod state;

pub use consumer::{EventConsumer, EventOutcome};
pub use error::{ConsumerError, DecodeError, Result};
pub use event::{OrderEvent, OrderLineItem};
pub use kafka::KafkaEventSource;
pub use memory::InMemoryEventSource;
pub use policy::{CommitPolicy, ConsumerConfig};
pub use source::{EventSource, InboundRecord};
pub use state::{ConsumerState, ConsumerStats};
