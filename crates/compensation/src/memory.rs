//! In-memory publisher that records everything it is given.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{CompensationNotice, CompensationPublisher, PublishError, StockDeductedEvent};

#[derive(Debug, Default)]
struct Recorded {
    notices: Vec<CompensationNotice>,
    deducted: Vec<StockDeductedEvent>,
}

/// In-memory compensation publisher for local mode and testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCompensationPublisher {
    recorded: Arc<Mutex<Recorded>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl InMemoryCompensationPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject every publish call.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns the compensation notices published so far, in order.
    pub async fn notices(&self) -> Vec<CompensationNotice> {
        self.recorded.lock().await.notices.clone()
    }

    /// Returns the stock-deducted events published so far, in order.
    pub async fn deducted_events(&self) -> Vec<StockDeductedEvent> {
        self.recorded.lock().await.deducted.clone()
    }

    fn check(&self) -> Result<(), PublishError> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(PublishError::Rejected("publisher configured to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CompensationPublisher for InMemoryCompensationPublisher {
    async fn publish_stock_deduction_failed(
        &self,
        notice: &CompensationNotice,
    ) -> Result<(), PublishError> {
        self.check()?;
        self.recorded.lock().await.notices.push(notice.clone());
        Ok(())
    }

    async fn publish_stock_deducted(&self, event: &StockDeductedEvent) -> Result<(), PublishError> {
        self.check()?;
        self.recorded.lock().await.deducted.push(event.clone());
        Ok(())
    }
}
