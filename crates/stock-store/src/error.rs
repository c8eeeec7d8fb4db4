use thiserror::Error;

use crate::ProductId;

/// Errors that can occur when interacting with the stock store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No product is stored under the given ID.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// A product with the given ID already exists.
    #[error("Product already exists: {0}")]
    AlreadyExists(ProductId),

    /// The conditional decrement was rejected because stock is too low.
    /// `available` is the stock level observed when the condition failed.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// Decrement quantities must be positive.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store cannot currently be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true for infrastructure failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::Migration(_) | StoreError::Unavailable(_)
        )
    }
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
