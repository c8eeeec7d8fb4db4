//! Ledger error types.

use stock_store::StoreError;
use thiserror::Error;

use crate::ProductId;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The product does not exist.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// A product with this ID already exists.
    #[error("Product already exists: {0}")]
    AlreadyExists(ProductId),

    /// Current stock is lower than the requested quantity.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The store could not be reached. The store error is kept as the
    /// source for logging but is not part of the message.
    #[error("Stock store temporarily unavailable")]
    TransientStore(#[source] StoreError),
}

impl LedgerError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::AlreadyExists(_) => "already_exists",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::InvalidRequest(_) => "invalid_request",
            LedgerError::TransientStore(_) => "transient_store",
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LedgerError::NotFound(id),
            StoreError::AlreadyExists(id) => LedgerError::AlreadyExists(id),
            StoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => LedgerError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            StoreError::InvalidQuantity(quantity) => {
                LedgerError::InvalidRequest(format!("quantity must be positive, got {quantity}"))
            }
            err @ (StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::Unavailable(_)) => LedgerError::TransientStore(err),
        }
    }
}
