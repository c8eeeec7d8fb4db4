//! Stock ledger service layer.
//!
//! This crate sits between callers (HTTP handlers, the order-event consumer)
//! and a [`StockStore`]:
//! - validates create and deduct requests
//! - maps store outcomes into [`LedgerError`]
//! - always hands back a [`StockDeductionResult`], even when a deduction fails

pub mod error;
pub mod request;
pub mod result;
pub mod service;

pub use common::{Money, ProductId};
pub use error::LedgerError;
pub use request::CreateProductRequest;
pub use result::{DeductionError, StockDeductionResult};
pub use service::StockLedger;
pub use stock_store::{Product, StockStore};
