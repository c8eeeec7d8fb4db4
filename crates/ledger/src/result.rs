//! Outcome of a stock deduction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LedgerError, ProductId};

/// Stock levels around a deduction request.
///
/// Produced for every call. On failure `previous_stock` and `new_stock`
/// carry whatever the store observed (equal to each other), so callers can
/// report availability without a second read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDeductionResult {
    pub product_id: ProductId,
    pub previous_stock: i64,
    pub new_stock: i64,
    /// The requested quantity.
    pub deducted: i64,
}

impl StockDeductionResult {
    pub(crate) fn unchanged(product_id: ProductId, stock: i64, requested: i64) -> Self {
        Self {
            product_id,
            previous_stock: stock,
            new_stock: stock,
            deducted: requested,
        }
    }
}

/// A failed deduction together with the result the store reported.
#[derive(Debug, Error)]
#[error("Stock deduction failed for product {}", .result.product_id)]
pub struct DeductionError {
    pub result: StockDeductionResult,
    #[source]
    pub error: LedgerError,
}
