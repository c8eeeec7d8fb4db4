use async_trait::async_trait;

use crate::{CompensationNotice, PublishError, StockDeductedEvent};

/// One-way emitter of deduction outcomes.
///
/// Callers treat every error as non-fatal: it is logged and processing
/// continues.
#[async_trait]
pub trait CompensationPublisher: Send + Sync {
    /// Publishes a "stock deduction failed" notice for one line item.
    async fn publish_stock_deduction_failed(
        &self,
        notice: &CompensationNotice,
    ) -> Result<(), PublishError>;

    /// Publishes a successful deduction. Publishers without a destination
    /// for these events keep the default no-op.
    async fn publish_stock_deducted(&self, _event: &StockDeductedEvent) -> Result<(), PublishError> {
        Ok(())
    }
}
