//! Durable storage for product records.
//!
//! The only mutation besides creation is [`StockStore::deduct_stock`], a
//! conditional decrement evaluated atomically by the backing store:
//! - [`PostgresStockStore`] pushes the comparison into a single `UPDATE ... WHERE stock >= $2`
//! - [`InMemoryStockStore`] holds a per-product lock for the check-and-mutate

pub mod error;
pub mod memory;
pub mod postgres;
pub mod product;
pub mod store;

pub use common::{Money, ProductId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use product::{Product, StockLevels};
pub use store::{StockStore, StockStoreExt};
