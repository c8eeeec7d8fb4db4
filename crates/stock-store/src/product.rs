//! Product record and decrement outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId};

/// A product with its current stock level.
///
/// `stock` is never negative in any stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product stamped with the current time.
    pub fn new(product_id: ProductId, name: impl Into<String>, price: Money, stock: i64) -> Self {
        let now = Utc::now();
        Self {
            product_id,
            name: name.into(),
            price,
            stock,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Stock levels around a successful conditional decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevels {
    pub previous_stock: i64,
    pub new_stock: i64,
}
