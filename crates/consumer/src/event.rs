//! Inbound order events.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Deserializer, Serialize};

use crate::DecodeError;

/// An order placed upstream, carrying the line items to deduct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Opaque token, unique per event; used for duplicate detection.
    pub event_id: String,
    pub order_id: OrderId,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub total_amount: Money,
    pub items: Vec<OrderLineItem>,
    #[serde(default)]
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Correlation ID for tracing across services.
    #[serde(default)]
    pub request_id: String,
}

/// One product and quantity within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// Accepts a string, or a numeric catalog id normalized to `PROD%03d`.
    #[serde(deserialize_with = "product_id_or_catalog_number")]
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub price: Money,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProductId {
    Text(String),
    Number(i64),
}

fn product_id_or_catalog_number<'de, D>(deserializer: D) -> Result<ProductId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawProductId::deserialize(deserializer)? {
        RawProductId::Text(id) => ProductId::new(id),
        RawProductId::Number(number) => ProductId::from_catalog_number(number),
    })
}

impl OrderEvent {
    /// Parses and validates a raw payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let event: OrderEvent = serde_json::from_slice(payload)?;
        event.validate()?;
        Ok(event)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.event_id.trim().is_empty() {
            return Err(DecodeError::Invalid("event_id is empty".to_string()));
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.product_id.is_blank() {
                return Err(DecodeError::Invalid(format!(
                    "item {index}: product_id is empty"
                )));
            }
            if item.quantity <= 0 {
                return Err(DecodeError::Invalid(format!(
                    "item {index}: quantity must be positive, got {}",
                    item.quantity
                )));
            }
        }
        Ok(())
    }
}
