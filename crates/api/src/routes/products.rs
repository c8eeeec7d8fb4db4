//! Product creation, lookup and direct stock deduction endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use consumer::EventSource;
use ledger::{CreateProductRequest, Product, ProductId, StockDeductionResult, StockLedger, StockStore};
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StockStore> {
    pub ledger: Arc<StockLedger<S>>,
    /// Order-event source, present when stream consumption is enabled.
    pub stream: Option<Arc<dyn EventSource>>,
    pub deployment: Deployment,
}

/// Static facts about how the service was started, reported by the health endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Deployment {
    /// `"local"` for the in-memory store, `"production"` otherwise.
    pub mode: &'static str,
    pub storage: &'static str,
    pub tls: bool,
}

impl<S: StockStore> AppState<S> {
    pub fn new(ledger: Arc<StockLedger<S>>, deployment: Deployment) -> Self {
        Self {
            ledger,
            stream: None,
            deployment,
        }
    }

    pub fn with_stream(mut self, stream: Arc<dyn EventSource>) -> Self {
        self.stream = Some(stream);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct DeductStockRequest {
    pub quantity: i64,
}

/// POST /api/v1/products: register a product with its initial stock.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    req: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(req) = req?;
    let product = state.ledger.create_product(req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/v1/products/{id}: current product record.
#[tracing::instrument(skip(state))]
pub async fn get<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = state.ledger.get_product(&ProductId::new(id)).await?;
    Ok(Json(product))
}

/// POST /api/v1/products/{id}/deduct: conditionally decrement stock.
#[tracing::instrument(skip(state, req))]
pub async fn deduct<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    req: Result<Json<DeductStockRequest>, JsonRejection>,
) -> Result<Json<StockDeductionResult>, ApiError> {
    let Json(req) = req?;
    let result = state
        .ledger
        .deduct_stock(&ProductId::new(id), req.quantity)
        .await?;
    Ok(Json(result))
}
