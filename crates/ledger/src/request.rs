//! Inbound requests handled by the ledger.

use serde::Deserialize;
use stock_store::Product;

use crate::{LedgerError, Money, ProductId};

/// Request to register a new product with its opening stock.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

impl CreateProductRequest {
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        stock: i64,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price,
            stock,
        }
    }

    /// Checks identity and non-negative price and stock.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.product_id.is_blank() {
            return Err(LedgerError::InvalidRequest(
                "product_id is required".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::InvalidRequest("name is required".to_string()));
        }
        if self.price.is_negative() {
            return Err(LedgerError::InvalidRequest(format!(
                "price must not be negative, got {}",
                self.price
            )));
        }
        if self.stock < 0 {
            return Err(LedgerError::InvalidRequest(format!(
                "stock must not be negative, got {}",
                self.stock
            )));
        }
        Ok(())
    }

    pub(crate) fn into_product(self) -> Product {
        Product::new(self.product_id, self.name, self.price, self.stock)
    }
}
