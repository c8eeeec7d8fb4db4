//! Ledger service providing the create, read and deduct API.

use std::time::Instant;

use stock_store::{Product, StockStore, StockStoreExt};

use crate::{CreateProductRequest, DeductionError, LedgerError, ProductId, StockDeductionResult};

/// Service for managing product stock.
///
/// Safe to share between the HTTP layer and the order-event consumer. All
/// mutual exclusion happens inside the store's conditional decrement.
pub struct StockLedger<S: StockStore> {
    store: S,
}

impl<S: StockStore> StockLedger<S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new product.
    ///
    /// The existence pre-check only gives a fast `AlreadyExists`; the store's
    /// conditional create is what guarantees a single record per ID.
    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn create_product(&self, request: CreateProductRequest) -> Result<Product, LedgerError> {
        request.validate()?;

        if self.store.product_exists(&request.product_id).await? {
            return Err(LedgerError::AlreadyExists(request.product_id));
        }

        let product = self.store.create(request.into_product()).await?;

        metrics::counter!("products_created_total").increment(1);
        tracing::info!(stock = product.stock, "product created");

        Ok(product)
    }

    /// Loads a product by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, LedgerError> {
        Ok(self.store.get(product_id).await?)
    }

    /// Deducts `quantity` units from a product's stock.
    ///
    /// Returns the deduction result on success. On failure the returned
    /// [`DeductionError`] still carries a result populated with the stock
    /// level the store reported.
    #[tracing::instrument(skip(self))]
    pub async fn deduct_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<StockDeductionResult, DeductionError> {
        if quantity <= 0 {
            let error =
                LedgerError::InvalidRequest(format!("quantity must be positive, got {quantity}"));
            return Err(self.deduction_failed(product_id, quantity, error));
        }

        let start = Instant::now();
        let outcome = self.store.deduct_stock(product_id, quantity).await;
        metrics::histogram!("stock_deduction_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match outcome {
            Ok(levels) => {
                metrics::counter!("stock_deductions_total").increment(1);
                tracing::info!(
                    previous_stock = levels.previous_stock,
                    new_stock = levels.new_stock,
                    "stock deducted"
                );
                Ok(StockDeductionResult {
                    product_id: product_id.clone(),
                    previous_stock: levels.previous_stock,
                    new_stock: levels.new_stock,
                    deducted: quantity,
                })
            }
            Err(err) => Err(self.deduction_failed(product_id, quantity, err.into())),
        }
    }

    fn deduction_failed(
        &self,
        product_id: &ProductId,
        quantity: i64,
        error: LedgerError,
    ) -> DeductionError {
        let observed = match &error {
            LedgerError::InsufficientStock { available, .. } => *available,
            _ => 0,
        };

        metrics::counter!("stock_deductions_failed", "reason" => error.kind()).increment(1);
        if let LedgerError::TransientStore(source) = &error {
            tracing::error!(error = %source, "stock deduction failed");
        } else {
            tracing::warn!(
                reason = error.kind(),
                available = observed,
                "stock deduction rejected"
            );
        }

        DeductionError {
            result: StockDeductionResult::unchanged(product_id.clone(), observed, quantity),
            error,
        }
    }
}
