use std::sync::Arc;

use async_trait::async_trait;

use crate::{Product, ProductId, Result, StockLevels, StoreError};

/// Core trait for stock store implementations.
///
/// A stock store owns product records exclusively. All implementations
/// must be thread-safe (Send + Sync) and must evaluate `deduct_stock`
/// atomically: two concurrent decrements against the same product can
/// never both succeed when their combined quantity exceeds the stock.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Persists a new product.
    ///
    /// This is a write-if-absent: fails with `AlreadyExists` if a record
    /// with the same ID is present, even under concurrent creates.
    async fn create(&self, product: Product) -> Result<Product>;

    /// Retrieves the latest committed record for a product.
    ///
    /// Fails with `NotFound` if the product does not exist.
    async fn get(&self, product_id: &ProductId) -> Result<Product>;

    /// Applies `stock = stock - quantity` only if `stock >= quantity`.
    ///
    /// Fails with `NotFound` if the product does not exist, or with
    /// `InsufficientStock` carrying the stock observed at failure time.
    /// A rejected decrement leaves the record unchanged.
    async fn deduct_stock(&self, product_id: &ProductId, quantity: i64) -> Result<StockLevels>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Extension trait providing convenience methods for stock stores.
#[async_trait]
pub trait StockStoreExt: StockStore {
    /// Checks if a product exists.
    async fn product_exists(&self, product_id: &ProductId) -> Result<bool> {
        match self.get(product_id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// Blanket implementation for all StockStore implementations
impl<T: StockStore + ?Sized> StockStoreExt for T {}

#[async_trait]
impl<T: StockStore + ?Sized> StockStore for Arc<T> {
    async fn create(&self, product: Product) -> Result<Product> {
        (**self).create(product).await
    }

    async fn get(&self, product_id: &ProductId) -> Result<Product> {
        (**self).get(product_id).await
    }

    async fn deduct_stock(&self, product_id: &ProductId, quantity: i64) -> Result<StockLevels> {
        (**self).deduct_stock(product_id, quantity).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }
}
