//! Compensation notifications for failed stock deductions.
//!
//! When a line item of an order event cannot be deducted, the consumer emits
//! a [`CompensationNotice`] so the order system can reconcile. Publishing is
//! best-effort: a [`PublishError`] is logged by the caller and never fails
//! event processing.
//!
//! Publishers may also announce successful deductions as [`StockDeductedEvent`]s.

pub mod error;
pub mod kafka;
pub mod memory;
pub mod notice;
pub mod publisher;

pub use common::{OrderId, ProductId};
pub use error::PublishError;
pub use kafka::KafkaCompensationPublisher;
pub use memory::InMemoryCompensationPublisher;
pub use notice::{CompensationNotice, FailureReason, StockDeductedEvent};
pub use publisher::CompensationPublisher;
