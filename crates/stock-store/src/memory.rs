use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::{Product, ProductId, Result, StockLevels, StockStore, StoreError};

type ProductSlot = Arc<Mutex<Product>>;

/// In-memory stock store for local mode and tests.
///
/// Each product lives behind its own mutex. A decrement holds only that
/// product's lock for the read-compare-write, so decrements against
/// different products never contend. The outer map lock is held just long
/// enough to look up or insert a slot.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    products: Arc<RwLock<HashMap<ProductId, ProductSlot>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory stock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Simulates an unreachable store: every operation fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn slot(&self, product_id: &ProductId) -> Result<ProductSlot> {
        self.products
            .read()
            .await
            .get(product_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(product_id.clone()))
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn create(&self, product: Product) -> Result<Product> {
        self.check_available()?;

        let mut products = self.products.write().await;
        match products.entry(product.product_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(product.product_id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(product.clone())));
                Ok(product)
            }
        }
    }

    async fn get(&self, product_id: &ProductId) -> Result<Product> {
        self.check_available()?;

        let slot = self.slot(product_id).await?;
        let product = slot.lock().await.clone();
        Ok(product)
    }

    async fn deduct_stock(&self, product_id: &ProductId, quantity: i64) -> Result<StockLevels> {
        self.check_available()?;
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        let slot = self.slot(product_id).await?;
        let mut product = slot.lock().await;

        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                available: product.stock,
                requested: quantity,
            });
        }

        let previous_stock = product.stock;
        product.stock -= quantity;
        product.updated_at = Utc::now();

        Ok(StockLevels {
            previous_stock,
            new_stock: product.stock,
        })
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
