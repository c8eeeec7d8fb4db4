//! Notification payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OrderId, ProductId};

/// Why a line item could not be deducted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InsufficientStock,
    ProductNotFound,
    TransientError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InsufficientStock => "insufficient_stock",
            FailureReason::ProductNotFound => "product_not_found",
            FailureReason::TransientError => "transient_error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted once per failed line item. Never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationNotice {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: FailureReason,
}

impl CompensationNotice {
    pub fn new(
        order_id: OrderId,
        product_id: ProductId,
        quantity: i64,
        reason: FailureReason,
    ) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            reason,
        }
    }
}

/// Announces a successful line-item deduction to downstream systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDeductedEvent {
    pub event_id: String,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub new_stock: i64,
    pub timestamp: DateTime<Utc>,
}

impl StockDeductedEvent {
    /// Creates an event with a fresh ID, stamped with the current time.
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: i64, new_stock: i64) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            order_id,
            product_id,
            quantity,
            new_stock,
            timestamp: Utc::now(),
        }
    }
}
