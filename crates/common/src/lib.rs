//! Shared value types and client settings for the stock ledger service.

pub mod kafka;
pub mod types;

pub use kafka::{KafkaSettings, TlsError, TlsIdentity};
pub use types::{Money, MoneyError, OrderId, ProductId};
